use crate::config::CameraConfig;
use crate::error::SourceError;
use crate::frame::RawFrame;
use crate::source::FrameSource;

/// Capture from a local camera through nokhwa.
///
/// The device stays closed until [`FrameSource::open`]; dropping the source
/// releases it.
pub struct CameraSource {
    config: CameraConfig,
    device: Option<backend::Device>,
    resolution: Option<(u32, u32)>,
    misses: u64,
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            device: None,
            resolution: None,
            misses: 0,
        }
    }

    /// Capture misses since the device was opened.
    pub fn misses(&self) -> u64 {
        self.misses
    }
}

impl FrameSource for CameraSource {
    fn open(&mut self) -> Result<(), SourceError> {
        if self.device.is_some() {
            return Ok(());
        }
        let (device, resolution) = backend::open(&self.config)?;
        log::info!(
            "camera {} opened at {}x{} (requested {}x{} @ {} fps)",
            self.config.index,
            resolution.0,
            resolution.1,
            self.config.width,
            self.config.height,
            self.config.fps
        );
        self.device = Some(device);
        self.resolution = Some(resolution);
        self.misses = 0;
        Ok(())
    }

    fn next_frame(&mut self) -> Option<RawFrame> {
        let device = self.device.as_mut()?;
        match backend::capture(device) {
            Ok(frame) if !frame.is_empty() => Some(frame),
            Ok(_) => {
                self.misses += 1;
                log::debug!("camera: {}", SourceError::EmptyFrame);
                None
            }
            Err(err) => {
                self.misses += 1;
                log::debug!("camera: capture miss: {err}");
                None
            }
        }
    }

    fn release(&mut self) {
        if let Some(mut device) = self.device.take() {
            backend::close(&mut device);
            log::info!("camera {} released after {} capture misses", self.config.index, self.misses);
        }
        self.resolution = None;
    }

    fn resolution(&self) -> Option<(u32, u32)> {
        self.resolution
    }

    fn describe(&self) -> String {
        format!("camera {}", self.config.index)
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(any(target_os = "windows", target_os = "macos", target_os = "linux"))]
mod backend {
    use nokhwa::Camera;
    use nokhwa::pixel_format::RgbFormat;
    use nokhwa::utils::{
        CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
    };

    use crate::config::CameraConfig;
    use crate::error::SourceError;
    use crate::frame::{PixelLayout, RawFrame};

    pub(super) type Device = Camera;

    pub(super) fn open(config: &CameraConfig) -> Result<(Device, (u32, u32)), SourceError> {
        let unavailable = |stage: &str, err: nokhwa::NokhwaError| SourceError::DeviceUnavailable {
            index: config.index,
            reason: format!("{stage}: {err}"),
        };

        let format = CameraFormat::new(
            Resolution::new(config.width, config.height),
            FrameFormat::YUYV,
            config.fps,
        );
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));

        let mut camera =
            Camera::new(CameraIndex::Index(config.index), requested).map_err(|e| unavailable("create", e))?;
        camera.open_stream().map_err(|e| unavailable("open stream", e))?;

        // The driver may pick a different mode than requested.
        let actual = camera.resolution();
        Ok((camera, (actual.width(), actual.height())))
    }

    pub(super) fn capture(camera: &mut Device) -> Result<RawFrame, SourceError> {
        let buffer = camera.frame().map_err(|_| SourceError::EmptyFrame)?;
        let image = buffer.decode_image::<RgbFormat>().map_err(|_| SourceError::EmptyFrame)?;
        let (width, height) = (image.width(), image.height());

        RawFrame::new(width, height, PixelLayout::Rgb8, image.into_raw()).map_err(|_| SourceError::EmptyFrame)
    }

    pub(super) fn close(camera: &mut Device) {
        if let Err(err) = camera.stop_stream() {
            log::warn!("camera: failed to stop stream: {err}");
        }
    }
}

#[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
mod backend {
    use crate::config::CameraConfig;
    use crate::error::SourceError;
    use crate::frame::RawFrame;

    pub(super) enum Device {}

    pub(super) fn open(_config: &CameraConfig) -> Result<(Device, (u32, u32)), SourceError> {
        Err(SourceError::Unsupported)
    }

    pub(super) fn capture(device: &mut Device) -> Result<RawFrame, SourceError> {
        match *device {}
    }

    pub(super) fn close(device: &mut Device) {
        match *device {}
    }
}
