//! Browser glue (wasm32 only): the animation-frame loop, timer and image-element futures,
//! and [`start`], which wires them to a canvas.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use futures_util::future::{FutureExt, LocalBoxFuture};
use glint_core::{ContextOptions, EngineError, GalleryConfig};
use glint_runtime_glow::{create_context, CanvasSurface, DecodedImage, PixelData, Surface};
use tracing::{debug, error, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlImageElement, KeyboardEvent};

use crate::app::GalleryApp;
use crate::loader::{ImageFuture, ImageSource, LoadError};
use crate::navigation::Navigation;

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

/// `requestAnimationFrame` loop. The callback gets the frame timestamp in milliseconds.
///
/// Dropping the loop stops it.
pub struct FrameLoop {
    callback: FrameCallback,
    running: Rc<RefCell<bool>>,
    request: Rc<RefCell<Option<i32>>>,
}

impl std::fmt::Debug for FrameLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLoop")
            .field("running", &*self.running.borrow())
            .finish()
    }
}

fn request_frame(callback: &FrameCallback) -> Result<i32, EngineError> {
    let window = web_sys::window().ok_or_else(|| EngineError::other("no browser window"))?;
    let slot = callback.borrow();
    let closure = slot
        .as_ref()
        .ok_or_else(|| EngineError::other("frame loop was stopped"))?;
    window
        .request_animation_frame(closure.as_ref().unchecked_ref())
        .map_err(|e| EngineError::other(format!("requestAnimationFrame: {e:?}")))
}

impl FrameLoop {
    pub fn start<F>(mut on_frame: F) -> Result<Self, EngineError>
    where
        F: FnMut(f64) + 'static,
    {
        let callback: FrameCallback = Rc::new(RefCell::new(None));
        let running = Rc::new(RefCell::new(true));
        let request = Rc::new(RefCell::new(None));

        let next = Rc::clone(&callback);
        let alive = Rc::clone(&running);
        let pending = Rc::clone(&request);
        *callback.borrow_mut() = Some(Closure::new(move |now_ms: f64| {
            if !*alive.borrow() {
                return;
            }
            on_frame(now_ms);
            match request_frame(&next) {
                Ok(id) => *pending.borrow_mut() = Some(id),
                Err(e) => {
                    error!(error = %e, "frame loop stopped");
                    *alive.borrow_mut() = false;
                }
            }
        }));

        let id = request_frame(&callback)?;
        *request.borrow_mut() = Some(id);
        Ok(Self {
            callback,
            running,
            request,
        })
    }

    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    pub fn stop(&self) {
        *self.running.borrow_mut() = false;
        if let (Some(id), Some(window)) = (self.request.borrow_mut().take(), web_sys::window()) {
            if let Err(e) = window.cancel_animation_frame(id) {
                warn!(error = ?e, "cancelAnimationFrame failed");
            }
        }
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        self.stop();
        // Breaks the closure's reference to its own slot.
        self.callback.borrow_mut().take();
    }
}

#[derive(Default)]
struct Signal<T> {
    value: Option<T>,
    waker: Option<Waker>,
}

impl<T> Signal<T> {
    fn fire(state: &Rc<RefCell<Self>>, value: T) {
        let mut state = state.borrow_mut();
        state.value = Some(value);
        if let Some(waker) = state.waker.take() {
            waker.wake();
        }
    }

    fn poll(state: &Rc<RefCell<Self>>, cx: &mut Context<'_>) -> Poll<T> {
        let mut state = state.borrow_mut();
        match state.value.take() {
            Some(value) => Poll::Ready(value),
            None => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

/// Resolves after `ms` milliseconds (`setTimeout`). Dropping it clears the timer.
pub struct Delay {
    state: Rc<RefCell<Signal<()>>>,
    timer: Option<i32>,
    _callback: Closure<dyn FnMut()>,
}

impl std::fmt::Debug for Delay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delay").field("timer", &self.timer).finish()
    }
}

impl Delay {
    pub fn new(ms: u64) -> Self {
        let state = Rc::new(RefCell::new(Signal::default()));
        let fired = Rc::clone(&state);
        let callback = Closure::<dyn FnMut()>::new(move || Signal::fire(&fired, ()));

        let timeout = ms.min(i32::MAX as u64) as i32;
        let timer = web_sys::window().and_then(|window| {
            window
                .set_timeout_with_callback_and_timeout_and_arguments_0(
                    callback.as_ref().unchecked_ref(),
                    timeout,
                )
                .map_err(|e| warn!(error = ?e, "setTimeout failed; delay never fires"))
                .ok()
        });
        Self {
            state,
            timer,
            _callback: callback,
        }
    }
}

impl Future for Delay {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        Signal::poll(&self.state, cx)
    }
}

impl Drop for Delay {
    fn drop(&mut self) {
        if let (Some(timer), Some(window)) = (self.timer.take(), web_sys::window()) {
            window.clear_timeout_with_handle(timer);
        }
    }
}

/// An image fetched through an `<img>` element and read back through a 2D canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlImage {
    url: String,
}

impl UrlImage {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

struct ImageLoad {
    element: HtmlImageElement,
    state: Rc<RefCell<Signal<bool>>>,
    _onload: Closure<dyn FnMut()>,
    _onerror: Closure<dyn FnMut()>,
}

impl Future for ImageLoad {
    type Output = Result<HtmlImageElement, ()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Signal::poll(&self.state, cx).map(|ok| if ok { Ok(self.element.clone()) } else { Err(()) })
    }
}

impl Drop for ImageLoad {
    fn drop(&mut self) {
        self.element.set_onload(None);
        self.element.set_onerror(None);
    }
}

impl UrlImage {
    fn fetch(&self) -> Result<ImageLoad, LoadError> {
        let element = HtmlImageElement::new().map_err(|e| self.decode_error(e))?;
        let state = Rc::new(RefCell::new(Signal::default()));

        let loaded = Rc::clone(&state);
        let onload = Closure::<dyn FnMut()>::new(move || Signal::fire(&loaded, true));
        let failed = Rc::clone(&state);
        let onerror = Closure::<dyn FnMut()>::new(move || Signal::fire(&failed, false));

        element.set_onload(Some(onload.as_ref().unchecked_ref()));
        element.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        element.set_cross_origin(Some("anonymous"));
        element.set_src(&self.url);
        Ok(ImageLoad {
            element,
            state,
            _onload: onload,
            _onerror: onerror,
        })
    }

    fn decode_error(&self, reason: impl std::fmt::Debug) -> LoadError {
        LoadError::Decode {
            name: self.url.clone(),
            reason: format!("{reason:?}"),
        }
    }

    fn read_pixels(&self, element: &HtmlImageElement) -> Result<DecodedImage, LoadError> {
        let (width, height) = (element.natural_width(), element.natural_height());
        let canvas = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| self.decode_error("no browser document"))?
            .create_element("canvas")
            .map_err(|e| self.decode_error(e))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|e| self.decode_error(e))?;
        canvas.set_width(width);
        canvas.set_height(height);

        let ctx2d = canvas
            .get_context("2d")
            .map_err(|e| self.decode_error(e))?
            .ok_or_else(|| self.decode_error("2d context unavailable"))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|e| self.decode_error(e))?;
        ctx2d
            .draw_image_with_html_image_element(element, 0.0, 0.0)
            .map_err(|e| self.decode_error(e))?;
        let data = ctx2d
            .get_image_data(0.0, 0.0, width as f64, height as f64)
            .map_err(|e| self.decode_error(e))?
            .data();
        Ok(DecodedImage::new(PixelData::U8(data.0), width, height))
    }
}

impl ImageSource for UrlImage {
    fn name(&self) -> &str {
        &self.url
    }

    fn load(&self) -> ImageFuture {
        let source = self.clone();
        async move {
            let element = source
                .fetch()?
                .await
                .map_err(|()| source.decode_error("image element reported an error"))?;
            source.read_pixels(&element)
        }
        .boxed_local()
    }
}

/// A gallery running on a canvas. Dropping it stops the frame loop and removes listeners.
pub struct Running {
    frames: FrameLoop,
    keydown: Closure<dyn FnMut(KeyboardEvent)>,
    app: Rc<RefCell<GalleryApp<glint_runtime_glow::GlowDevice>>>,
}

impl std::fmt::Debug for Running {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Running")
            .field("frames", &self.frames)
            .finish()
    }
}

impl Running {
    pub fn navigate(&self, nav: Navigation) -> bool {
        self.app.borrow_mut().navigate(nav)
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        self.app.borrow().cancel_loading();
        if let Some(window) = web_sys::window() {
            if let Err(e) = window
                .remove_event_listener_with_callback("keydown", self.keydown.as_ref().unchecked_ref())
            {
                warn!(error = ?e, "failed to remove keydown listener");
            }
        }
    }
}

/// Mount the gallery on `<canvas id=canvas_id>`: images load from `urls`, the transition mask
/// from `mix_url`, arrow keys navigate.
pub fn start(
    canvas_id: &str,
    config: GalleryConfig,
    urls: &[&str],
    mix_url: &str,
) -> Result<Running, EngineError> {
    let mut surface = CanvasSurface::from_element_id(canvas_id)?;
    surface.attach_resize_listener()?;
    let ctx = create_context(&mut surface, &ContextOptions::default())?;

    let (width, height) = surface.size();
    let aspect = width as f32 / height.max(1) as f32;
    let deadline: Option<LocalBoxFuture<'static, ()>> =
        config.load_timeout_ms.map(|ms| Delay::new(ms).boxed_local());
    let sources: Vec<UrlImage> = urls.iter().copied().map(UrlImage::new).collect();
    let app = Rc::new(RefCell::new(GalleryApp::new(
        config,
        aspect,
        &sources,
        UrlImage::new(mix_url),
        deadline,
    )));
    app.borrow_mut().resize(&ctx, width, height);

    let keys = Rc::clone(&app);
    let keydown = Closure::<dyn FnMut(KeyboardEvent)>::new(move |event: KeyboardEvent| {
        if let Some(nav) = Navigation::from_key_code(event.key_code()) {
            keys.borrow_mut().navigate(nav);
        }
    });
    let window = web_sys::window().ok_or_else(|| EngineError::other("no browser window"))?;
    window
        .add_event_listener_with_callback("keydown", keydown.as_ref().unchecked_ref())
        .map_err(|e| EngineError::other(format!("keydown listener: {e:?}")))?;

    let frames = Rc::clone(&app);
    let frame_loop = FrameLoop::start(move |now_ms| {
        let mut app = frames.borrow_mut();
        if let Some((w, h)) = surface.take_resize() {
            debug!(width = w, height = h, "canvas resized");
            app.resize(&ctx, w, h);
        }
        if let Err(e) = app.frame(&ctx, now_ms) {
            error!(error = %e, "gallery frame failed");
        }
    })?;

    Ok(Running {
        frames: frame_loop,
        keydown,
        app,
    })
}
