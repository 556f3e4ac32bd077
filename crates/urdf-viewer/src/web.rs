//! Browser entry point

use wasm_bindgen::prelude::*;

use crate::UrdfViewerApp;

/// Handle the embedding page keeps to drive the viewer
#[wasm_bindgen]
pub struct WebHandle {
    runner: eframe::WebRunner,
}

#[wasm_bindgen]
impl WebHandle {
    #[allow(clippy::new_without_default)]
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        eframe::WebLogger::init(log::LevelFilter::Debug).ok();
        Self {
            runner: eframe::WebRunner::new(),
        }
    }

    /// Start the viewer on `canvas`
    #[wasm_bindgen]
    pub async fn start(&self, canvas: web_sys::HtmlCanvasElement) -> Result<(), JsValue> {
        let web_options = eframe::WebOptions {
            wgpu_options: crate::wgpu_options(),
            ..Default::default()
        };

        self.runner
            .start(
                canvas,
                web_options,
                Box::new(|cc| Ok(Box::new(UrdfViewerApp::new(cc, None, None)))),
            )
            .await?;

        tracing::debug!("Web app started");
        Ok(())
    }

    /// Show a JSON payload, replacing the current robot
    #[wasm_bindgen]
    pub fn load_payload(&self, json: &str) -> Result<(), JsValue> {
        let Some(mut app) = self.runner.app_mut::<UrdfViewerApp>() else {
            return Err(JsValue::from_str("viewer is not running"));
        };
        app.load_payload_json(json)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Release the robot, GPU resources and the canvas
    #[wasm_bindgen]
    pub fn destroy(&self) {
        if let Some(mut app) = self.runner.app_mut::<UrdfViewerApp>() {
            app.dispose();
        }
        self.runner.destroy();
    }
}
