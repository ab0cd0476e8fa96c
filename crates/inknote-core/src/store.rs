//! Persistence boundary: the remote page store the engine syncs against.
//!
//! Transport is the host's concern; any HTTP/RPC binding that satisfies
//! these contracts works. The in-memory implementation backs tests and
//! doubles as the reference semantics (idempotent upserts by id, deleting
//! an absent id is not an error).

use crate::model::{ImageId, ImageItem, Layer, LayerId, PageId, Stroke, StrokeId};
use kurbo::Rect;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use thiserror::Error;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("network error: {0}")]
    Network(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Boxed future for async store operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Remote persistence API for strokes, images, layers and thumbnails.
pub trait PageStore: Send + Sync {
    /// Fetch all strokes of a page, optionally restricted to one layer.
    fn list_strokes(
        &self,
        page: PageId,
        layer: Option<LayerId>,
    ) -> BoxFuture<'_, StoreResult<Vec<Stroke>>>;

    /// Fetch all images of a page.
    fn list_images(&self, page: PageId) -> BoxFuture<'_, StoreResult<Vec<ImageItem>>>;

    /// Idempotent batched upsert by stroke id. Returns the stored ids.
    fn upsert_strokes(
        &self,
        page: PageId,
        layer: LayerId,
        strokes: Vec<Stroke>,
    ) -> BoxFuture<'_, StoreResult<Vec<StrokeId>>>;

    /// Idempotent delete; absent ids are skipped. Returns the removed count.
    fn delete_strokes(
        &self,
        page: PageId,
        ids: Vec<StrokeId>,
    ) -> BoxFuture<'_, StoreResult<usize>>;

    fn create_image(&self, page: PageId, image: ImageItem) -> BoxFuture<'_, StoreResult<ImageId>>;

    fn update_image_rect(&self, id: ImageId, rect: Rect) -> BoxFuture<'_, StoreResult<()>>;

    fn delete_image(&self, id: ImageId) -> BoxFuture<'_, StoreResult<()>>;

    fn create_layer(&self, page: PageId, name: String) -> BoxFuture<'_, StoreResult<Layer>>;

    /// Rejected if it would remove the page's last layer.
    fn delete_layer(&self, page: PageId, layer: LayerId) -> BoxFuture<'_, StoreResult<()>>;

    /// Store an encoded page thumbnail.
    fn update_page_thumbnail(&self, page: PageId, png: Vec<u8>) -> BoxFuture<'_, StoreResult<()>>;
}

#[derive(Default)]
struct MemoryStoreInner {
    strokes: HashMap<PageId, HashMap<StrokeId, Stroke>>,
    images: HashMap<PageId, HashMap<ImageId, ImageItem>>,
    layers: HashMap<PageId, Vec<Layer>>,
    thumbnails: HashMap<PageId, Vec<u8>>,
    upsert_calls: usize,
}

/// In-memory store for tests and local sessions.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of strokes currently stored for a page.
    pub fn stroke_count(&self, page: PageId) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.strokes.get(&page).map_or(0, |m| m.len())
    }

    pub fn stored_stroke(&self, page: PageId, id: StrokeId) -> Option<Stroke> {
        let inner = self.inner.lock().unwrap();
        inner.strokes.get(&page).and_then(|m| m.get(&id)).cloned()
    }

    pub fn thumbnail(&self, page: PageId) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().thumbnails.get(&page).cloned()
    }

    /// How many upsert batches were issued (for exactly-once assertions).
    pub fn upsert_calls(&self) -> usize {
        self.inner.lock().unwrap().upsert_calls
    }

    /// Seed strokes directly, bypassing the upsert path.
    pub fn seed_strokes(&self, page: PageId, strokes: Vec<Stroke>) {
        let mut inner = self.inner.lock().unwrap();
        let map = inner.strokes.entry(page).or_default();
        for s in strokes {
            map.insert(s.id, s);
        }
    }
}

impl PageStore for MemoryStore {
    fn list_strokes(
        &self,
        page: PageId,
        layer: Option<LayerId>,
    ) -> BoxFuture<'_, StoreResult<Vec<Stroke>>> {
        Box::pin(async move {
            let inner = self.inner.lock().unwrap();
            let strokes = inner
                .strokes
                .get(&page)
                .map(|m| {
                    m.values()
                        .filter(|s| layer.is_none_or(|l| s.layer_id == l))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            Ok(strokes)
        })
    }

    fn list_images(&self, page: PageId) -> BoxFuture<'_, StoreResult<Vec<ImageItem>>> {
        Box::pin(async move {
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .images
                .get(&page)
                .map(|m| m.values().cloned().collect())
                .unwrap_or_default())
        })
    }

    fn upsert_strokes(
        &self,
        page: PageId,
        _layer: LayerId,
        strokes: Vec<Stroke>,
    ) -> BoxFuture<'_, StoreResult<Vec<StrokeId>>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            inner.upsert_calls += 1;
            let map = inner.strokes.entry(page).or_default();
            let ids = strokes.iter().map(|s| s.id).collect();
            for s in strokes {
                map.insert(s.id, s);
            }
            Ok(ids)
        })
    }

    fn delete_strokes(
        &self,
        page: PageId,
        ids: Vec<StrokeId>,
    ) -> BoxFuture<'_, StoreResult<usize>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            let Some(map) = inner.strokes.get_mut(&page) else {
                return Ok(0);
            };
            let mut removed = 0;
            for id in ids {
                if map.remove(&id).is_some() {
                    removed += 1;
                }
            }
            Ok(removed)
        })
    }

    fn create_image(&self, page: PageId, image: ImageItem) -> BoxFuture<'_, StoreResult<ImageId>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            let id = image.id;
            inner.images.entry(page).or_default().insert(id, image);
            Ok(id)
        })
    }

    fn update_image_rect(&self, id: ImageId, rect: Rect) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            for images in inner.images.values_mut() {
                if let Some(image) = images.get_mut(&id) {
                    image.x = rect.x0;
                    image.y = rect.y0;
                    image.width = rect.width();
                    image.height = rect.height();
                    return Ok(());
                }
            }
            Err(StoreError::NotFound(id.to_string()))
        })
    }

    fn delete_image(&self, id: ImageId) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            for images in inner.images.values_mut() {
                images.remove(&id);
            }
            Ok(())
        })
    }

    fn create_layer(&self, page: PageId, name: String) -> BoxFuture<'_, StoreResult<Layer>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            let layers = inner.layers.entry(page).or_default();
            let order = layers.iter().map(|l| l.sort_order + 1).max().unwrap_or(0);
            let layer = Layer::new(name, order);
            layers.push(layer.clone());
            Ok(layer)
        })
    }

    fn delete_layer(&self, page: PageId, layer: LayerId) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            let layers = inner.layers.entry(page).or_default();
            if layers.len() <= 1 {
                return Err(StoreError::Rejected(
                    "cannot delete the last layer".to_string(),
                ));
            }
            layers.retain(|l| l.id != layer);
            Ok(())
        })
    }

    fn update_page_thumbnail(&self, page: PageId, png: Vec<u8>) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            self.inner.lock().unwrap().thumbnails.insert(page, png);
            Ok(())
        })
    }
}

/// Wrapper that fails the next `n` write requests, for sync retry tests.
pub struct FlakyStore<S> {
    inner: S,
    failures_left: Mutex<usize>,
}

impl<S: PageStore> FlakyStore<S> {
    pub fn new(inner: S, failures: usize) -> Self {
        Self {
            inner,
            failures_left: Mutex::new(failures),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn try_fail(&self) -> StoreResult<()> {
        let mut left = self.failures_left.lock().unwrap();
        if *left > 0 {
            *left -= 1;
            return Err(StoreError::Network("simulated outage".to_string()));
        }
        Ok(())
    }
}

impl<S: PageStore> PageStore for FlakyStore<S> {
    fn list_strokes(
        &self,
        page: PageId,
        layer: Option<LayerId>,
    ) -> BoxFuture<'_, StoreResult<Vec<Stroke>>> {
        self.inner.list_strokes(page, layer)
    }

    fn list_images(&self, page: PageId) -> BoxFuture<'_, StoreResult<Vec<ImageItem>>> {
        self.inner.list_images(page)
    }

    fn upsert_strokes(
        &self,
        page: PageId,
        layer: LayerId,
        strokes: Vec<Stroke>,
    ) -> BoxFuture<'_, StoreResult<Vec<StrokeId>>> {
        Box::pin(async move {
            self.try_fail()?;
            self.inner.upsert_strokes(page, layer, strokes).await
        })
    }

    fn delete_strokes(
        &self,
        page: PageId,
        ids: Vec<StrokeId>,
    ) -> BoxFuture<'_, StoreResult<usize>> {
        Box::pin(async move {
            self.try_fail()?;
            self.inner.delete_strokes(page, ids).await
        })
    }

    fn create_image(&self, page: PageId, image: ImageItem) -> BoxFuture<'_, StoreResult<ImageId>> {
        Box::pin(async move {
            self.try_fail()?;
            self.inner.create_image(page, image).await
        })
    }

    fn update_image_rect(&self, id: ImageId, rect: Rect) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            self.try_fail()?;
            self.inner.update_image_rect(id, rect).await
        })
    }

    fn delete_image(&self, id: ImageId) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            self.try_fail()?;
            self.inner.delete_image(id).await
        })
    }

    fn create_layer(&self, page: PageId, name: String) -> BoxFuture<'_, StoreResult<Layer>> {
        self.inner.create_layer(page, name)
    }

    fn delete_layer(&self, page: PageId, layer: LayerId) -> BoxFuture<'_, StoreResult<()>> {
        self.inner.delete_layer(page, layer)
    }

    fn update_page_thumbnail(&self, page: PageId, png: Vec<u8>) -> BoxFuture<'_, StoreResult<()>> {
        self.inner.update_page_thumbnail(page, png)
    }
}

/// Minimal single-future executor for tests and synchronous hosts.
///
/// The store futures used here never yield without completing, so polling
/// in a loop with a no-op waker is sufficient.
pub fn block_on<F: Future>(f: F) -> F::Output {
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn dummy_raw_waker() -> RawWaker {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            dummy_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    let mut f = std::pin::pin!(f);

    loop {
        match f.as_mut().poll(&mut cx) {
            Poll::Ready(result) => return result,
            Poll::Pending => {}
        }
    }
}
