mod app;

use app::SeisViewApp;
use eframe::egui;
use eframe::egui_wgpu;
use seisview::ViewerConfig;
use tracing_subscriber::EnvFilter;

/// Path of an optional JSON viewer config.
const CONFIG_ENV: &str = "SEISVIEW_CONFIG";

fn load_config() -> ViewerConfig {
    let Ok(path) = std::env::var(CONFIG_ENV) else {
        return ViewerConfig::default();
    };
    match ViewerConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Ignoring {CONFIG_ENV}={path}: {e}");
            ViewerConfig::default()
        }
    }
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("seisview=info")),
        )
        .init();

    let config = load_config();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("seisview")
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([800.0, 600.0]),
        wgpu_options: egui_wgpu::WgpuConfiguration {
            present_mode: eframe::wgpu::PresentMode::AutoVsync,
            wgpu_setup: egui_wgpu::WgpuSetup::CreateNew(egui_wgpu::WgpuSetupCreateNew {
                instance_descriptor: eframe::wgpu::InstanceDescriptor {
                    backends: eframe::wgpu::Backends::DX12
                        | eframe::wgpu::Backends::VULKAN
                        | eframe::wgpu::Backends::GL,
                    ..Default::default()
                },
                power_preference: eframe::wgpu::PowerPreference::HighPerformance,
                ..Default::default()
            }),
            ..Default::default()
        },
        ..Default::default()
    };

    eframe::run_native(
        "seisview",
        options,
        Box::new(move |cc| Ok(Box::new(SeisViewApp::new(cc, config)))),
    )
}
