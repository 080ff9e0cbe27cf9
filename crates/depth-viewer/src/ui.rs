//! HUD drawn over the scene with egui.

/// Status line, anchor count and the depth-map toggle.
///
/// On devices without depth support the toggle is disabled and forced off,
/// and labelled accordingly.
pub fn draw_hud(
    ctx: &egui::Context,
    status: &str,
    anchor_count: usize,
    depth_supported: bool,
    show_depth_map: &mut bool,
) {
    egui::Window::new("session-hud")
        .title_bar(false)
        .resizable(false)
        .anchor(egui::Align2::LEFT_BOTTOM, [12.0, -12.0])
        .show(ctx, |ui| {
            ui.label(status);
            ui.label(format!("Anchors: {anchor_count}"));
            if depth_supported {
                ui.checkbox(show_depth_map, "Show depth map");
            } else {
                *show_depth_map = false;
                ui.add_enabled(
                    false,
                    egui::Checkbox::new(show_depth_map, "Depth not available"),
                );
            }
            ui.small("Tap: place object   R: rotate display");
        });
}
