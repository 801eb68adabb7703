//! Asynchronous image loading with cancellation and an optional deadline.
//!
//! Sources hand back futures of [`DecodedImage`]; nothing here needs a particular executor.
//! The browser frame loop polls the combined future once per frame, tests use
//! `futures::executor::block_on`.

use futures_util::future::{
    abortable, select, try_join_all, AbortHandle, Aborted, Either, FutureExt, LocalBoxFuture,
};
use futures_util::pin_mut;
use glint_runtime_glow::{DecodedImage, PixelData};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error("image loading was cancelled")]
    Cancelled,

    #[error("image loading did not finish before the deadline")]
    TimedOut,

    #[error("failed to load `{name}`: {reason}")]
    Decode { name: String, reason: String },

    #[error("`{name}`: {got} values do not fill {width}x{height} RGBA")]
    InvalidShape {
        name: String,
        width: u32,
        height: u32,
        got: usize,
    },
}

pub type ImageFuture = LocalBoxFuture<'static, Result<DecodedImage, LoadError>>;

/// Something that can produce a decoded RGBA image.
pub trait ImageSource {
    /// Used in errors and logs.
    fn name(&self) -> &str;

    fn load(&self) -> ImageFuture;
}

impl<T: ImageSource + ?Sized> ImageSource for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn load(&self) -> ImageFuture {
        (**self).load()
    }
}

/// An image that is already decoded.
#[derive(Debug, Clone)]
pub struct MemoryImage {
    name: String,
    image: DecodedImage,
}

impl MemoryImage {
    pub fn new(name: impl Into<String>, image: DecodedImage) -> Self {
        Self {
            name: name.into(),
            image,
        }
    }

    /// A `width`×`height` image of one color.
    pub fn solid(name: impl Into<String>, width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let texels = width as usize * height as usize;
        let data = rgba.iter().copied().cycle().take(texels * 4).collect();
        Self::new(name, DecodedImage::new(PixelData::U8(data), width, height))
    }
}

impl ImageSource for MemoryImage {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> ImageFuture {
        futures_util::future::ready(Ok(self.image.clone())).boxed_local()
    }
}

/// Cancels the load it was returned with.
#[derive(Debug, Clone)]
pub struct LoadHandle {
    abort: AbortHandle,
}

impl LoadHandle {
    /// The load resolves to [`LoadError::Cancelled`] the next time it is polled.
    pub fn cancel(&self) {
        self.abort.abort();
    }
}

/// Check that `image` carries exactly `width * height` RGBA texels.
pub fn check_shape(name: &str, image: &DecodedImage) -> Result<(), LoadError> {
    let expected = image.width() as usize * image.height() as usize * 4;
    if image.width() == 0 || image.height() == 0 || image.data.len() != expected {
        return Err(LoadError::InvalidShape {
            name: name.to_string(),
            width: image.width(),
            height: image.height(),
            got: image.data.len(),
        });
    }
    Ok(())
}

/// Load every source; the result keeps the source order.
///
/// The first failure wins. When `deadline` resolves first the load fails with
/// [`LoadError::TimedOut`].
pub fn load_all<S>(
    sources: &[S],
    deadline: Option<LocalBoxFuture<'static, ()>>,
) -> (LoadHandle, LocalBoxFuture<'static, Result<Vec<DecodedImage>, LoadError>>)
where
    S: ImageSource,
{
    let loads: Vec<_> = sources
        .iter()
        .map(|source| {
            let name = source.name().to_string();
            let pending = source.load();
            async move {
                let image = pending.await?;
                check_shape(&name, &image)?;
                debug!(name = %name, width = image.width(), height = image.height(), "image decoded");
                Ok::<_, LoadError>(image)
            }
        })
        .collect();
    let count = loads.len();

    let (all, abort) = abortable(try_join_all(loads));
    let guarded = async move {
        match all.await {
            Ok(result) => result,
            Err(Aborted) => Err(LoadError::Cancelled),
        }
    };

    let future = async move {
        let result = match deadline {
            None => guarded.await,
            Some(deadline) => {
                pin_mut!(guarded);
                match select(guarded, deadline).await {
                    Either::Left((result, _)) => result,
                    Either::Right(((), _)) => Err(LoadError::TimedOut),
                }
            }
        };
        match &result {
            Ok(_) => debug!(count, "all images loaded"),
            Err(e) => warn!(error = %e, "image loading failed"),
        }
        result
    }
    .boxed_local();

    (LoadHandle { abort }, future)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use futures_util::future::{pending, ready};

    struct Never;

    impl ImageSource for Never {
        fn name(&self) -> &str {
            "never"
        }

        fn load(&self) -> ImageFuture {
            pending().boxed_local()
        }
    }

    struct Broken;

    impl ImageSource for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn load(&self) -> ImageFuture {
            ready(Err(LoadError::Decode {
                name: "broken".into(),
                reason: "truncated".into(),
            }))
            .boxed_local()
        }
    }

    #[test]
    fn resolves_in_source_order() {
        let sources = [
            MemoryImage::solid("a", 2, 2, [255, 0, 0, 255]),
            MemoryImage::solid("b", 3, 1, [0, 255, 0, 255]),
        ];
        let (_handle, load) = load_all(&sources, None);
        let images = block_on(load).expect("load");
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].shape, [2, 2]);
        assert_eq!(images[1].shape, [3, 1]);
    }

    #[test]
    fn cancel_before_completion() {
        let (handle, load) = load_all(&[Never], None);
        handle.cancel();
        assert_eq!(block_on(load), Err(LoadError::Cancelled));
    }

    #[test]
    fn deadline_beats_a_stalled_source() {
        let (_handle, load) = load_all(&[Never], Some(ready(()).boxed_local()));
        assert_eq!(block_on(load), Err(LoadError::TimedOut));
    }

    #[test]
    fn finished_load_ignores_a_pending_deadline() {
        let sources = [MemoryImage::solid("a", 1, 1, [0; 4])];
        let (_handle, load) = load_all(&sources, Some(pending().boxed_local()));
        assert!(block_on(load).is_ok());
    }

    #[test]
    fn first_failure_is_reported() {
        let (_handle, load) = load_all(&[Broken], None);
        assert!(matches!(block_on(load), Err(LoadError::Decode { .. })));
    }

    #[test]
    fn short_pixel_data_is_rejected() {
        let bad = MemoryImage::new("bad", DecodedImage::new(PixelData::U8(vec![0; 7]), 2, 1));
        let (_handle, load) = load_all(&[bad], None);
        assert_eq!(
            block_on(load),
            Err(LoadError::InvalidShape {
                name: "bad".into(),
                width: 2,
                height: 1,
                got: 7,
            })
        );
    }
}
