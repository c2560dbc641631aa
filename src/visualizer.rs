// src/visualizer.rs
use eframe::egui;
use egui::{Color32, Pos2, Shape, Stroke, Vec2};

use crate::drivers::gauge_percent;

const GAUGE_START: Color32 = Color32::from_rgb(255, 107, 220);
const GAUGE_END: Color32 = Color32::from_rgb(109, 91, 255);
const TRACK: Color32 = Color32::from_rgb(34, 34, 34);

// 各频段的曲线颜色
pub fn band_color(label: &str, index: usize) -> Color32 {
    match label {
        "alpha" | "low_alpha" => Color32::from_rgb(255, 107, 220),
        "high_alpha" => Color32::from_rgb(255, 160, 230),
        "beta" | "low_beta" => Color32::from_rgb(0, 229, 255),
        "high_beta" => Color32::from_rgb(120, 240, 255),
        "gamma" | "low_gamma" => Color32::from_rgb(255, 20, 147),
        "high_gamma" => Color32::from_rgb(255, 99, 71),
        "theta" => Color32::from_rgb(147, 112, 219),
        "delta" => Color32::from_rgb(65, 105, 225),
        _ => {
            const FALLBACK: [Color32; 4] = [Color32::YELLOW, Color32::GREEN, Color32::LIGHT_BLUE, Color32::WHITE];
            FALLBACK[index % FALLBACK.len()]
        }
    }
}

fn lerp_color(a: Color32, b: Color32, t: f32) -> Color32 {
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    Color32::from_rgb(mix(a.r(), b.r()), mix(a.g(), b.g()), mix(a.b(), b.b()))
}

/// 圆环进度表, 从 12 点方向顺时针填充
pub fn draw_gauge(ui: &mut egui::Ui, label: &str, value: f64) {
    let radius = 80.0;
    let stroke = 16.0;
    let size = 200.0;
    let percent = gauge_percent(value);

    ui.vertical_centered(|ui| {
        let (response, painter) = ui.allocate_painter(Vec2::splat(size), egui::Sense::hover());
        let center = response.rect.center();
        painter.circle_stroke(center, radius, Stroke::new(stroke, TRACK));

        // 渐变弧线: 分段绘制
        let segments = (percent as usize).max(1);
        let sweep = std::f32::consts::TAU * (percent as f32 / 100.0);
        let point = |angle: f32| -> Pos2 {
            let a = angle - std::f32::consts::FRAC_PI_2;
            center + Vec2::new(a.cos(), a.sin()) * radius
        };
        if percent > 0.0 {
            for i in 0..segments {
                let t0 = i as f32 / segments as f32;
                let t1 = (i + 1) as f32 / segments as f32;
                let color = lerp_color(GAUGE_START, GAUGE_END, t0);
                painter.add(Shape::line_segment(
                    [point(sweep * t0), point(sweep * t1)],
                    Stroke::new(stroke, color),
                ));
            }
            painter.circle_filled(point(0.0), stroke / 2.0, GAUGE_START);
            painter.circle_filled(point(sweep), stroke / 2.0, lerp_color(GAUGE_START, GAUGE_END, 1.0));
        }

        painter.text(
            center,
            egui::Align2::CENTER_CENTER,
            format!("{}%", percent as i64),
            egui::FontId::proportional(24.0),
            Color32::WHITE,
        );
        ui.label(egui::RichText::new(label).color(Color32::from_rgb(212, 212, 216)));
    });
}
