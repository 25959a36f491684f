//! WASM bindings for the reflow engine

pub mod flat_buffer;

use crate::error::ReflowError;
use crate::{
    BlockId, BlockRect, Document, FrameOutcome, PageHeaders, RectTable, ReflowConfig, ReflowEngine,
    RequestOutcome, Trigger,
};
use flat_buffer::DecorationBuffer;
use wasm_bindgen::prelude::*;

/// Values per rect record in [`WasmReflowEngine::set_rects`]: id, top, bottom
pub const RECT_STRIDE: usize = 3;

/// Initialize panic hook for better error messages
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn js_error(err: ReflowError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Decode `[id, top, bottom]` triples
fn decode_rects(data: &[f64]) -> Result<RectTable, ReflowError> {
    if data.len() % RECT_STRIDE != 0 {
        return Err(ReflowError::MalformedRectBuffer {
            len: data.len(),
            stride: RECT_STRIDE,
        });
    }
    Ok(data
        .chunks_exact(RECT_STRIDE)
        // Ids are integral; anything else is a host bug, not a block
        .filter(|r| r[0].is_finite() && r[0] >= 0.0 && r[0].fract() == 0.0)
        .map(|r| (BlockId(r[0] as u64), BlockRect::new(r[1] as f32, r[2] as f32)))
        .collect())
}

/// WASM-exposed reflow engine.
///
/// The host pushes the document and block rects whenever they change, calls
/// `notify`, and drives `frame` from `requestAnimationFrame`.
#[wasm_bindgen]
pub struct WasmReflowEngine {
    engine: ReflowEngine,
    document: Document,
    rects: RectTable,
    buffer: DecorationBuffer,
}

#[wasm_bindgen]
impl WasmReflowEngine {
    /// Create an engine with the default configuration
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self::from_config(ReflowConfig::default())
    }

    /// Create an engine from a (possibly partial) JSON config
    #[wasm_bindgen(js_name = withConfig)]
    pub fn with_config(json: &str) -> Result<WasmReflowEngine, JsValue> {
        let config = ReflowConfig::from_json(json).map_err(js_error)?;
        Ok(Self::from_config(config))
    }

    /// Replace the document snapshot (JSON array of root nodes)
    #[wasm_bindgen(js_name = setDocument)]
    pub fn set_document(&mut self, json: &str, version: u64) -> Result<(), JsValue> {
        self.document = Document::from_json(json).map_err(js_error)?.with_version(version);
        Ok(())
    }

    /// Replace block rects with flat `[id, top, bottom]` triples
    #[wasm_bindgen(js_name = setRects)]
    pub fn set_rects(&mut self, data: &[f64]) -> Result<(), JsValue> {
        self.rects = decode_rects(data).map_err(js_error)?;
        Ok(())
    }

    /// Record a change. Returns true when the host must request a frame.
    pub fn notify(&mut self, trigger: &str) -> Result<bool, JsValue> {
        let trigger = Trigger::from_name(trigger)
            .ok_or_else(|| JsValue::from_str(&format!("unknown trigger: {trigger}")))?;
        Ok(self.engine.notify(trigger) == RequestOutcome::RequestFrame)
    }

    /// Animation-frame callback. Returns true when another frame is needed.
    pub fn frame(&mut self, header_tops: &[f32], container_count: usize, page_height: f32) -> bool {
        let headers = PageHeaders::new(header_tops.to_vec(), container_count);
        let outcome = self
            .engine
            .frame(&self.document, &headers, page_height, &self.rects);
        if matches!(outcome, FrameOutcome::Done | FrameOutcome::RequestFrame) {
            self.buffer.write_set(&self.engine.decorations());
        }
        outcome == FrameOutcome::RequestFrame
    }

    /// Run a pass immediately, bypassing the scheduler
    #[wasm_bindgen(js_name = runPass)]
    pub fn run_pass(
        &mut self,
        header_tops: &[f32],
        container_count: usize,
        page_height: f32,
    ) -> Result<(), JsValue> {
        let headers = PageHeaders::new(header_tops.to_vec(), container_count);
        let set = self
            .engine
            .run_pass(&self.document, &headers, page_height, &self.rects)
            .map_err(|err| js_error(err.into()))?;
        self.buffer.write_set(&set);
        Ok(())
    }

    /// Number of committed passes
    pub fn generation(&self) -> u64 {
        self.engine.generation()
    }

    /// Current decoration set as JSON
    #[wasm_bindgen(js_name = decorationsJson)]
    pub fn decorations_json(&self) -> String {
        serde_json::to_string(&*self.engine.decorations()).unwrap_or_else(|_| "null".to_string())
    }

    /// Last pass telemetry as JSON, when enabled in the config
    #[wasm_bindgen(js_name = telemetryJson)]
    pub fn telemetry_json(&self) -> Option<String> {
        self.engine
            .telemetry()
            .and_then(|t| serde_json::to_string(t).ok())
    }

    /// Counters of the last pass as JSON
    #[wasm_bindgen(js_name = countersJson)]
    pub fn counters_json(&self) -> String {
        serde_json::to_string(&self.engine.counters()).unwrap_or_else(|_| "null".to_string())
    }

    // Flat buffer accessors; valid until the next committed pass

    #[wasm_bindgen(js_name = u32Ptr)]
    pub fn u32_ptr(&self) -> u32 {
        self.buffer.u32_ptr()
    }

    #[wasm_bindgen(js_name = u32Len)]
    pub fn u32_len(&self) -> u32 {
        self.buffer.u32_len()
    }

    #[wasm_bindgen(js_name = f32Ptr)]
    pub fn f32_ptr(&self) -> u32 {
        self.buffer.f32_ptr()
    }

    #[wasm_bindgen(js_name = f32Len)]
    pub fn f32_len(&self) -> u32 {
        self.buffer.f32_len()
    }

    #[wasm_bindgen(js_name = textPtr)]
    pub fn text_ptr(&self) -> u32 {
        self.buffer.text_ptr()
    }

    #[wasm_bindgen(js_name = textLen)]
    pub fn text_len(&self) -> u32 {
        self.buffer.text_len()
    }
}

impl WasmReflowEngine {
    fn from_config(config: ReflowConfig) -> Self {
        let mut buffer = DecorationBuffer::new();
        let engine = ReflowEngine::new(config);
        buffer.write_set(&engine.decorations());
        Self {
            engine,
            document: Document::default(),
            rects: RectTable::new(),
            buffer,
        }
    }
}

impl Default for WasmReflowEngine {
    fn default() -> Self {
        Self::new()
    }
}
