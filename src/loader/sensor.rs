//! Scroll proximity sensing.
//!
//! A sensor watches the distance between a sentinel row and the viewport
//! bottom and asks the loader for the next page once the gap shrinks inside
//! the configured margin. It holds the loader weakly so a discarded loader is
//! never kept alive by its own sensor, and it disconnects itself the moment
//! the loader is gone or torn down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tracing::debug;

use super::PaginatedLoader;
use crate::error::LoaderError;

/// Watches scroll position and triggers `load_more` near the end of the list.
pub struct ProximitySensor {
    loader: Weak<PaginatedLoader>,
    margin: f64,
    disconnected: AtomicBool,
}

impl ProximitySensor {
    /// Attach a sensor to a loader with the given trigger margin in pixels.
    pub fn attach(loader: &Arc<PaginatedLoader>, margin: f64) -> Self {
        Self {
            loader: Arc::downgrade(loader),
            margin,
            disconnected: AtomicBool::new(false),
        }
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    /// Stop observing. Returns `false` if the sensor was already disconnected.
    pub fn disconnect(&self) -> bool {
        !self.disconnected.swap(true, Ordering::SeqCst)
    }

    /// Report a scroll sample.
    ///
    /// `sentinel_offset` is the document offset of the sentinel row and
    /// `viewport_bottom` the offset of the viewport's bottom edge. When the
    /// sentinel is within `margin` of the viewport this requests the next
    /// page; the loader's own in-flight guard collapses rapid repeat samples
    /// into a single fetch.
    pub async fn observe(&self, sentinel_offset: f64, viewport_bottom: f64) {
        if self.is_disconnected() {
            return;
        }
        let Some(loader) = self.loader.upgrade() else {
            self.disconnect();
            return;
        };
        if loader.is_torn_down() {
            self.disconnect();
            return;
        }

        let distance = sentinel_offset - viewport_bottom;
        if distance > self.margin {
            return;
        }

        match loader.load_more().await {
            Ok(()) | Err(LoaderError::TornDown) => {}
            Err(err) => {
                // The loader already recorded the failure; the sensor only
                // notes that a scroll-triggered fetch did not land.
                debug!(error = %err, distance, "Proximity-triggered load failed");
            }
        }
    }
}
