pub mod preprocessing;
pub mod postprocess;
pub mod yolo;
pub mod steps;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use image::DynamicImage;

use crate::models::Detection;
pub use yolo::{YoloDetector, YoloParams};

/// An opaque object detector. Boxes are in the coordinates of `image`.
pub trait Detector: Send + Sync {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>>;

    fn name(&self) -> &str;
}

type Loader = Box<dyn Fn() -> Result<Arc<dyn Detector>> + Send + Sync>;

/// Detector that is only built the first time it is used
pub struct LazyDetector {
    name: String,
    loader: Loader,
    inner: Mutex<Option<Arc<dyn Detector>>>,
}

impl LazyDetector {
    pub fn new<F>(name: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Detector>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            loader: Box::new(loader),
            inner: Mutex::new(None),
        }
    }

    /// Lazily load a YOLO model file
    pub fn yolo(path: PathBuf, labels: Vec<String>, params: YoloParams) -> Self {
        let name = path.display().to_string();
        Self::new(name, move || {
            let detector = YoloDetector::load(&path, labels.clone(), params)?;
            Ok(Arc::new(detector) as Arc<dyn Detector>)
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.lock().map(|guard| guard.is_some()).unwrap_or(false)
    }

    fn get(&self) -> Result<Arc<dyn Detector>> {
        // Clone the Arc so the lock is released before inference runs
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow!("detector '{}' lock poisoned", self.name))?;
        if let Some(detector) = guard.as_ref() {
            return Ok(detector.clone());
        }

        log::info!("Loading detector {}...", self.name);
        let detector = (self.loader)()?;
        *guard = Some(detector.clone());
        Ok(detector)
    }
}

impl Detector for LazyDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>> {
        self.get()?.detect(image)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Nothing;

    impl Detector for Nothing {
        fn detect(&self, _image: &DynamicImage) -> Result<Vec<Detection>> {
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "nothing"
        }
    }

    #[test]
    fn lazy_detector_loads_once_on_first_use() -> Result<()> {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let lazy = LazyDetector::new("counting", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Nothing) as Arc<dyn Detector>)
        });

        assert!(!lazy.is_loaded());
        assert_eq!(loads.load(Ordering::SeqCst), 0);

        let img = DynamicImage::new_rgb8(4, 4);
        lazy.detect(&img)?;
        lazy.detect(&img)?;
        assert!(lazy.is_loaded());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test]
    fn missing_model_fails_on_use_not_construction() {
        let lazy = LazyDetector::yolo(
            PathBuf::from("/nonexistent/model.rten"),
            vec![],
            YoloParams::default(),
        );
        let err = lazy.detect(&DynamicImage::new_rgb8(4, 4));
        assert!(err.is_err());
        assert!(!lazy.is_loaded());
    }
}
