use egui::{Color32, Visuals};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggle(&self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    pub fn visuals(&self) -> Visuals {
        match self {
            Theme::Dark => Visuals::dark(),
            Theme::Light => Visuals::light(),
        }
    }

    pub fn waveform_bg(&self) -> Color32 {
        match self {
            Theme::Dark => Color32::from_rgb(16, 22, 26),
            Theme::Light => Color32::from_rgb(250, 250, 250),
        }
    }

    pub fn label_bg(&self) -> Color32 {
        match self {
            Theme::Dark => Color32::from_rgb(30, 38, 44),
            Theme::Light => Color32::from_rgb(232, 234, 237),
        }
    }

    pub fn divider(&self) -> Color32 {
        match self {
            Theme::Dark => Color32::from_rgb(60, 70, 78),
            Theme::Light => Color32::from_rgb(190, 195, 200),
        }
    }

    pub fn text(&self) -> Color32 {
        match self {
            Theme::Dark => Color32::from_rgb(220, 224, 228),
            Theme::Light => Color32::from_rgb(30, 30, 30),
        }
    }

    pub fn dim_text(&self) -> Color32 {
        self.text().gamma_multiply(0.6)
    }

    pub fn crosshair(&self) -> Color32 {
        match self {
            Theme::Dark => Color32::from_rgba_unmultiplied(255, 255, 255, 90),
            Theme::Light => Color32::from_rgba_unmultiplied(0, 0, 0, 90),
        }
    }

    pub fn selection_tint(&self) -> Color32 {
        Color32::from_rgba_unmultiplied(72, 175, 240, 40)
    }

    pub fn zoom_brush(&self) -> Color32 {
        Color32::from_rgba_unmultiplied(150, 150, 150, 60)
    }

    pub fn measure_overlay(&self) -> Color32 {
        Color32::from_rgba_unmultiplied(255, 255, 255, 40)
    }

    pub fn mask_indicator(&self) -> Color32 {
        Color32::from_rgb(235, 87, 87)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Theme::Dark => "Dark",
            Theme::Light => "Light",
        }
    }
}

/// `[u8; 4]` RGBA to a normalized float color for GPU uniforms.
pub fn rgba_to_f32(c: [u8; 4]) -> [f32; 4] {
    [
        c[0] as f32 / 255.0,
        c[1] as f32 / 255.0,
        c[2] as f32 / 255.0,
        c[3] as f32 / 255.0,
    ]
}

pub fn rgba_to_color32(c: [u8; 4]) -> Color32 {
    Color32::from_rgba_unmultiplied(c[0], c[1], c[2], c[3])
}
