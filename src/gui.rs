use std::sync::Arc;

use eframe::egui;
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::collector::{Notify, SignalCollector};
use crate::config::Settings;
use crate::platform::{Os, Platform};
use crate::remediation;
use crate::report::{DeviceSignals, Indicator, Signal, Tone};

/// Visibility of the remediation popups, one per tappable signal.
/// Each goes closed -> open on tap and back on close; they don't affect each other.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Modals {
    developer_mode: bool,
    secure_lock: bool,
    rooted: bool,
}

impl Modals {
    fn slot(&mut self, signal: Signal) -> Option<&mut bool> {
        match signal {
            Signal::DeveloperMode => Some(&mut self.developer_mode),
            Signal::SecureLock => Some(&mut self.secure_lock),
            Signal::Rooted => Some(&mut self.rooted),
            Signal::Encryption | Signal::Network => None,
        }
    }

    /// Opens the popup for `signal`. Display-only signals have none; returns
    /// whether a popup is open afterwards.
    pub fn tap(&mut self, signal: Signal) -> bool {
        match self.slot(signal) {
            Some(open) => {
                *open = true;
                true
            }
            None => false,
        }
    }

    pub fn close(&mut self, signal: Signal) {
        if let Some(open) = self.slot(signal) {
            *open = false;
        }
    }

    pub fn is_open(&self, signal: Signal) -> bool {
        match signal {
            Signal::DeveloperMode => self.developer_mode,
            Signal::SecureLock => self.secure_lock,
            Signal::Rooted => self.rooted,
            Signal::Encryption | Signal::Network => false,
        }
    }

    pub fn open_signals(&self) -> Vec<Signal> {
        Signal::ALL.into_iter().filter(|s| self.is_open(*s)).collect()
    }
}

/// Everything the screen shows, independent of the UI toolkit.
#[derive(Debug, Clone)]
pub struct Screen {
    pub os: Os,
    pub signals: DeviceSignals,
    pub modals: Modals,
}

impl Screen {
    pub fn new(os: Os, developer_mode: bool) -> Self {
        Self {
            os,
            signals: DeviceSignals::new(developer_mode),
            modals: Modals::default(),
        }
    }

    pub fn indicators(&self) -> Vec<Indicator> {
        self.signals.indicators()
    }

    pub fn tap(&mut self, signal: Signal) -> bool {
        let opened = self.modals.tap(signal);
        if opened {
            debug!("Opened {signal} instructions");
        }
        opened
    }
}

pub struct MainApp {
    screen: Screen,
    settings: Settings,
    platform: Platform,
    runtime: Handle,
    notify: Notify,
    collector: Option<SignalCollector>,
}

impl MainApp {
    /// Mounts the screen and fires the probes.
    pub fn new(cc: &eframe::CreationContext<'_>, settings: Settings, platform: Platform, runtime: Handle) -> Self {
        let ctx = cc.egui_ctx.clone();
        let notify: Notify = Arc::new(move || ctx.request_repaint());
        let mut app = Self {
            screen: Screen::new(platform.os, settings.developer_mode()),
            settings,
            platform,
            runtime,
            notify,
            collector: None,
        };
        app.start_checks();
        app
    }

    fn start_checks(&mut self) {
        // Dropping the previous collector cancels whatever it still had running.
        self.collector = None;
        self.screen.signals = DeviceSignals::new(self.settings.developer_mode());
        self.collector = Some(SignalCollector::start(
            &self.runtime,
            &self.platform,
            self.settings.probe_timeout(),
            self.notify.clone(),
        ));
    }

    fn poll_checks(&mut self) {
        let Some(collector) = self.collector.as_mut() else {
            return;
        };
        collector.drain_into(&mut self.screen.signals);
        if collector.is_finished() {
            info!("All device checks finished");
            self.collector = None;
        }
    }

    fn checking(&self) -> bool {
        self.collector.is_some()
    }
}

fn tone_color(tone: Tone) -> egui::Color32 {
    match tone {
        Tone::Green => egui::Color32::from_rgb(44, 167, 97),
        Tone::Red => egui::Color32::from_rgb(220, 50, 50),
        Tone::Grey => egui::Color32::GRAY,
    }
}

impl eframe::App for MainApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_checks();

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui
                    .add_enabled(!self.checking(), egui::Button::new("🔄 Re-check"))
                    .clicked()
                {
                    info!("Re-running device checks");
                    self.start_checks();
                }
                if self.checking() {
                    ui.spinner();
                    ui.label("Checking device...");
                }
            });
        });

        egui::CentralPanel::default()
            .frame(
                egui::Frame::default()
                    .fill(egui::Color32::from_rgb(19, 28, 36))
                    .inner_margin(16.0),
            )
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.label(egui::RichText::new(self.screen.os.icon()).size(40.0));
                    ui.heading(
                        egui::RichText::new(self.screen.os.to_string())
                            .size(24.0)
                            .color(egui::Color32::WHITE),
                    );
                });

                ui.add_space(16.0);
                ui.separator();
                ui.add_space(8.0);

                ui.vertical_centered(|ui| {
                    for row in self.screen.indicators() {
                        egui::Frame::default()
                            .fill(egui::Color32::from_white_alpha(20))
                            .rounding(10.0)
                            .inner_margin(10.0)
                            .show(ui, |ui| {
                                ui.set_width(300.0);
                                ui.horizontal(|ui| {
                                    ui.label(
                                        egui::RichText::new(row.signal.icon())
                                            .size(32.0)
                                            .color(tone_color(row.tone)),
                                    );
                                    ui.add_space(12.0);
                                    let text = egui::RichText::new(&row.label)
                                        .size(16.0)
                                        .color(egui::Color32::WHITE)
                                        .strong();
                                    if row.tappable {
                                        let button = egui::Button::new(text).frame(false);
                                        if ui
                                            .add(button)
                                            .on_hover_text("Click for instructions")
                                            .clicked()
                                        {
                                            self.screen.tap(row.signal);
                                        }
                                    } else {
                                        ui.label(text);
                                    }
                                });
                            });
                        ui.add_space(12.0);
                    }
                });
            });

        let escape = ctx.input(|i| i.key_pressed(egui::Key::Escape));
        for signal in self.screen.modals.open_signals() {
            let Some(help) = remediation::for_signal(signal, self.screen.os) else {
                continue;
            };
            let mut open = true;
            let mut close_clicked = false;
            egui::Window::new(&help.title)
                .open(&mut open)
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.set_min_width(300.0);
                    ui.vertical_centered(|ui| {
                        ui.label(egui::RichText::new(help.body).size(16.0));
                        ui.add_space(12.0);
                        if ui
                            .add(
                                egui::Button::new(
                                    egui::RichText::new("Close").color(egui::Color32::WHITE).strong(),
                                )
                                .fill(egui::Color32::from_rgb(33, 150, 243))
                                .min_size(egui::vec2(280.0, 30.0))
                                .rounding(5.0),
                            )
                            .clicked()
                        {
                            close_clicked = true;
                        }
                    });
                });
            if !open || close_clicked || escape {
                self.screen.modals.close(signal);
            }
        }
    }
}
