//! The [`StreamDeck`] facade

use std::sync::Arc;

use deckport_ipc::{CloseOutcome, DeviceSession, IpcResult, TransportContext, TransportKind};
use futures::future::{BoxFuture, try_join_all};
use futures::{FutureExt, TryFutureExt};
use hid_streamdeck_protocol::{
    DeckCapabilities, DeckModel, EncodedImage, KeyState, PageDispatch, brightness_report,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::error::DeckResult;
use crate::events::{DeckEvent, Subscribers, spawn_event_pump};
use crate::select::{DeckDevice, select_all_devices, select_device};

/// One open Stream Deck panel.
///
/// Every fill, clear and brightness call validates its arguments before
/// anything is sent; a rejected call leaves the device untouched. Calls
/// resolve to the number of bytes the device accepted.
///
/// Key transitions are tracked from the moment the panel opens, whether or
/// not anyone has subscribed.
pub struct StreamDeck {
    device: DeckDevice,
    session: DeviceSession,
    key_state: Arc<Mutex<KeyState>>,
    subscribers: Arc<Subscribers>,
    pump: JoinHandle<()>,
}

impl StreamDeck {
    /// Open `device` over the `kind` transport of `context`.
    pub async fn open(
        context: &TransportContext,
        kind: TransportKind,
        device: DeckDevice,
    ) -> DeckResult<Self> {
        let session = context.session(kind, device.path()).await?;
        let key_state = Arc::new(Mutex::new(KeyState::new(device.model.key_count())));
        let subscribers = Arc::new(Subscribers::default());
        let pump = spawn_event_pump(
            device.path().to_string(),
            session.events(),
            Arc::clone(&key_state),
            Arc::clone(&subscribers),
        );

        if let Err(e) = session.open() {
            pump.abort();
            return Err(e.into());
        }
        info!(
            path = %device.path(),
            device = %device.info.display_name(),
            model = %device.model,
            transport = %kind,
            "Opened Stream Deck"
        );
        Ok(Self {
            device,
            session,
            key_state,
            subscribers,
            pump,
        })
    }

    /// Open the first supported panel the context's backend enumerates.
    pub async fn connect(
        context: &TransportContext,
        kind: TransportKind,
        vendor: Option<u16>,
        product: Option<u16>,
    ) -> DeckResult<Option<Self>> {
        let devices = context.backend().list_devices()?;
        match select_device(&devices, vendor, product)? {
            Some(device) => Ok(Some(Self::open(context, kind, device).await?)),
            None => Ok(None),
        }
    }

    /// Open every supported panel the context's backend enumerates.
    pub async fn connect_all(
        context: &TransportContext,
        kind: TransportKind,
        vendor: Option<u16>,
        product: Option<u16>,
    ) -> DeckResult<Vec<Self>> {
        let devices = context.backend().list_devices()?;
        let mut decks = Vec::new();
        for device in select_all_devices(&devices, vendor, product)? {
            decks.push(Self::open(context, kind, device).await?);
        }
        Ok(decks)
    }

    pub fn device(&self) -> &DeckDevice {
        &self.device
    }

    pub fn path(&self) -> &str {
        self.device.path()
    }

    pub fn model(&self) -> DeckModel {
        self.device.model
    }

    pub fn capabilities(&self) -> DeckCapabilities {
        DeckCapabilities::from(self.device.model)
    }

    pub fn icon_size(&self) -> usize {
        self.device.model.icon_size()
    }

    pub fn key_count(&self) -> usize {
        self.device.model.key_count()
    }

    pub fn check_valid_key_index(&self, key_index: usize) -> DeckResult<()> {
        Ok(self.device.model.check_valid_key_index(key_index)?)
    }

    /// The key at column `x`, row `y`.
    pub fn button_index_from_position(&self, x: usize, y: usize) -> DeckResult<usize> {
        Ok(self.device.model.button_index_from_position(x, y)?)
    }

    /// Call `f` with every key index in ascending order.
    pub fn for_each_key(&self, mut f: impl FnMut(usize, &Self)) -> &Self {
        for key in 0..self.key_count() {
            f(key, self);
        }
        self
    }

    pub fn pressed_keys(&self) -> Vec<usize> {
        self.key_state.lock().pressed_keys()
    }

    pub fn is_pressed(&self, key_index: usize) -> bool {
        self.key_state.lock().is_pressed(key_index)
    }

    /// Key transitions and hardware errors from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<DeckEvent> {
        self.subscribers.subscribe()
    }

    /// Draw an RGB icon (`icon_size` square, row-major) on a key.
    pub async fn fill_image(&self, key_index: usize, rgb: &[u8]) -> DeckResult<usize> {
        let image = self.device.model.encode_image(key_index, rgb)?;
        Ok(self.send_image(image).await?)
    }

    /// Fill a key with a solid color; each channel must be in 0 - 255.
    pub async fn fill_color(&self, key_index: usize, r: i32, g: i32, b: i32) -> DeckResult<usize> {
        let image = self.device.model.encode_color(key_index, r, g, b)?;
        Ok(self.send_image(image).await?)
    }

    /// Fill a key with a solid `0xRRGGBB` color.
    pub async fn fill_color_packed(&self, key_index: usize, rgb: u32) -> DeckResult<usize> {
        let image = self.device.model.encode_color_packed(key_index, rgb)?;
        Ok(self.send_image(image).await?)
    }

    pub async fn clear_key(&self, key_index: usize) -> DeckResult<usize> {
        self.fill_color_packed(key_index, 0).await
    }

    pub async fn clear_all_keys(&self) -> DeckResult<usize> {
        let model = self.device.model;
        let images = (0..model.key_count())
            .map(|key| model.encode_color_packed(key, 0))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.send_images(images).await?)
    }

    /// Draw one RGB image across the whole panel.
    ///
    /// The buffer is `columns * icon_size` by `rows * icon_size` pixels,
    /// row-major; each tile lands on the key the layout puts under it.
    pub async fn fill_panel(&self, rgb: &[u8]) -> DeckResult<usize> {
        let model = self.device.model;
        let images = model
            .split_panel(rgb)?
            .into_iter()
            .map(|(key, tile)| model.encode_image(key, &tile))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.send_images(images).await?)
    }

    /// Set the backlight, 0 - 100 percent.
    pub async fn set_brightness(&self, percentage: u8) -> DeckResult<usize> {
        let report = brightness_report(percentage)?;
        Ok(self.session.send_feature_report(report.to_vec()).await?)
    }

    /// Send a raw output report.
    pub async fn write(&self, report: Vec<u8>) -> DeckResult<usize> {
        Ok(self.session.write(report).await?)
    }

    /// Send a raw feature report.
    pub async fn send_feature_report(&self, report: Vec<u8>) -> DeckResult<usize> {
        Ok(self.session.send_feature_report(report).await?)
    }

    /// Release the device. The handle closes once no other panel object in
    /// the same context has it open.
    pub async fn close(self) -> DeckResult<()> {
        self.pump.abort();
        match self.session.close() {
            CloseOutcome::Teardown(reply) => {
                reply.await?;
                debug!(path = %self.path(), "Stream Deck closed");
            }
            CloseOutcome::Released => {
                debug!(path = %self.path(), "Released shared Stream Deck");
            }
            CloseOutcome::NotOpen => {}
        }
        Ok(())
    }

    fn send_images(&self, images: Vec<EncodedImage>) -> BoxFuture<'static, IpcResult<usize>> {
        let sends: Vec<_> = images.into_iter().map(|image| self.send_image(image)).collect();
        try_join_all(sends)
            .map_ok(|counts| counts.into_iter().sum::<usize>())
            .boxed()
    }

    /// Post every page now; the returned future sums the device's counts.
    fn send_image(&self, image: EncodedImage) -> BoxFuture<'static, IpcResult<usize>> {
        trace!(
            path = %self.path(),
            key_index = image.key_index,
            pages = image.pages.len(),
            bytes = image.total_len(),
            "Sending key image"
        );
        match image.dispatch {
            PageDispatch::Batched => self.session.write_multi(image.pages).boxed(),
            PageDispatch::Independent => {
                let writes: Vec<_> = image
                    .pages
                    .into_iter()
                    .map(|page| self.session.write(page))
                    .collect();
                try_join_all(writes)
                    .map_ok(|counts| counts.into_iter().sum::<usize>())
                    .boxed()
            }
        }
    }
}

impl Drop for StreamDeck {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

impl std::fmt::Debug for StreamDeck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDeck")
            .field("model", &self.device.model)
            .field("path", &self.device.path())
            .field("pressed", &self.key_state.lock().bits())
            .finish_non_exhaustive()
    }
}
