//! Browser canvas surface (wasm32 only).

use std::cell::RefCell;
use std::rc::Rc;

use glint_core::{ContextOptions, EngineError};
use tracing::{debug, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{HtmlCanvasElement, WebGl2RenderingContext, WebGlRenderingContext};

use crate::context::{ApiVariant, Surface};
use crate::glow_device::GlowDevice;

/// Size the resize listener saw last, until the frame loop takes it.
pub type PendingResize = Rc<RefCell<Option<(u32, u32)>>>;

pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    pending: PendingResize,
    listener: Option<Closure<dyn FnMut()>>,
}

impl std::fmt::Debug for CanvasSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasSurface")
            .field("size", &self.size())
            .field("listening", &self.listener.is_some())
            .finish()
    }
}

impl CanvasSurface {
    pub fn new(canvas: HtmlCanvasElement) -> Self {
        Self {
            canvas,
            pending: Rc::new(RefCell::new(None)),
            listener: None,
        }
    }

    /// Look up `<canvas id=...>` in the current document.
    pub fn from_element_id(id: &str) -> Result<Self, EngineError> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| EngineError::other("no browser document"))?;
        let canvas = document
            .get_element_by_id(id)
            .ok_or_else(|| EngineError::other(format!("no element with id `{id}`")))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| EngineError::other(format!("element `{id}` is not a canvas")))?;
        Ok(Self::new(canvas))
    }

    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    /// Resize the canvas to the window now, and again on every window `resize` event.
    ///
    /// Calling this again replaces the previous listener.
    pub fn attach_resize_listener(&mut self) -> Result<(), EngineError> {
        let window = web_sys::window().ok_or_else(|| EngineError::other("no browser window"))?;
        self.detach_resize_listener();

        let canvas = self.canvas.clone();
        let pending = Rc::clone(&self.pending);
        let fit = move || {
            let Some(window) = web_sys::window() else {
                return;
            };
            let dim = |v: Result<JsValue, JsValue>| {
                v.ok().and_then(|v| v.as_f64()).map_or(0, |v| v as u32)
            };
            let (w, h) = (dim(window.inner_width()), dim(window.inner_height()));
            canvas.set_width(w);
            canvas.set_height(h);
            *pending.borrow_mut() = Some((w, h));
        };
        fit();

        let closure = Closure::<dyn FnMut()>::new(fit);
        window
            .add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref())
            .map_err(|e| EngineError::other(format!("resize listener: {e:?}")))?;
        self.listener = Some(closure);
        Ok(())
    }

    pub fn detach_resize_listener(&mut self) {
        let Some(closure) = self.listener.take() else {
            return;
        };
        if let Some(window) = web_sys::window() {
            if let Err(e) = window
                .remove_event_listener_with_callback("resize", closure.as_ref().unchecked_ref())
            {
                warn!(error = ?e, "failed to remove resize listener");
            }
        }
    }

    /// Shared flag the frame loop polls.
    pub fn pending_resize(&self) -> PendingResize {
        Rc::clone(&self.pending)
    }

    /// The size set by the last resize event, once.
    pub fn take_resize(&self) -> Option<(u32, u32)> {
        self.pending.borrow_mut().take()
    }

    fn context_attributes(options: &ContextOptions) -> JsValue {
        let attrs = js_sys::Object::new();
        for (key, value) in [
            ("alpha", options.alpha),
            ("antialias", options.antialias),
            ("depth", options.depth),
            ("premultipliedAlpha", options.premultiplied_alpha),
        ] {
            // Reflect::set only fails on frozen objects.
            let _ = js_sys::Reflect::set(&attrs, &JsValue::from_str(key), &JsValue::from_bool(value));
        }
        attrs.into()
    }
}

impl Drop for CanvasSurface {
    fn drop(&mut self) {
        self.detach_resize_listener();
    }
}

impl Surface for CanvasSurface {
    type Device = GlowDevice;

    fn size(&self) -> (u32, u32) {
        (self.canvas.width(), self.canvas.height())
    }

    fn acquire(&mut self, variant: ApiVariant, options: &ContextOptions) -> Option<GlowDevice> {
        if variant == ApiVariant::NativeGl {
            return None;
        }
        let attrs = Self::context_attributes(options);
        let raw = match self
            .canvas
            .get_context_with_context_options(variant.context_name(), &attrs)
        {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                debug!(variant = variant.context_name(), error = ?e, "getContext threw");
                return None;
            }
        };

        let gl = if variant.is_modern() {
            glow::Context::from_webgl2_context(raw.dyn_into::<WebGl2RenderingContext>().ok()?)
        } else {
            glow::Context::from_webgl1_context(raw.dyn_into::<WebGlRenderingContext>().ok()?)
        };
        // SAFETY: a WebGL context is only ever used from the thread that owns the canvas.
        Some(unsafe { GlowDevice::new(gl) })
    }
}
