//! Scan screen controller.
//!
//! Drives image acquisition (camera or gallery), cropping, submission and
//! result display. Acquisition and cropping are delegated to an
//! [`ImageCapture`]; everything the user would see is reported as a
//! [`ScreenEvent`].

mod files;

pub use files::{crop_to_jpeg, CropRect, CropRectError, FileImageCapture};

use crate::scan::{
    display_error_message, ImagePayload, OperationState, ScanPipeline, ScanState, ScanTransport,
};
use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const CROP_GUIDANCE: &str = "Please highlight the section of sidewalk in your photo!";
pub const NO_IMAGE_MESSAGE: &str = "Please capture an image first";
pub const SCAN_SUCCESS_MESSAGE: &str = "Scan successful";

/// Reference to an image produced by capture, gallery or crop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHandle(PathBuf);

impl ImageHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

/// User-driven image acquisition. Each call yields at most one image.
#[async_trait]
pub trait ImageCapture: Send + Sync {
    async fn capture_image(&self) -> Result<ImageHandle>;

    /// `None` when the user picked nothing.
    async fn pick_from_gallery(&self) -> Result<Option<ImageHandle>>;

    /// `None` when cropping was cancelled or failed.
    async fn crop_image(&self, image: ImageHandle) -> Result<Option<ImageHandle>>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScreenEvent {
    CropGuidance {
        message: String,
    },
    ImageShown {
        image: PathBuf,
    },
    Progress {
        visible: bool,
    },
    Toast {
        message: String,
    },
    ShowResult {
        label: Option<String>,
        description: Option<String>,
        image: PathBuf,
    },
}

/// Callback type for screen events
pub type ScreenCallback = Box<dyn Fn(ScreenEvent) + Send + Sync>;

pub struct ScanScreen<C: ImageCapture, T: ScanTransport> {
    capture: C,
    pipeline: ScanPipeline<T>,
    current_image: Option<ImageHandle>,
    on_event: ScreenCallback,
}

impl<C: ImageCapture, T: ScanTransport + 'static> ScanScreen<C, T> {
    pub fn new(capture: C, pipeline: ScanPipeline<T>, on_event: ScreenCallback) -> Self {
        Self {
            capture,
            pipeline,
            current_image: None,
            on_event,
        }
    }

    pub fn current_image(&self) -> Option<&ImageHandle> {
        self.current_image.as_ref()
    }

    fn emit(&self, event: ScreenEvent) {
        (self.on_event)(event);
    }

    /// Take a photo, then offer it for cropping.
    pub async fn start_camera(&mut self) {
        match self.capture.capture_image().await {
            Ok(image) => {
                self.current_image = Some(image.clone());
                self.start_crop(image).await;
            }
            Err(e) => tracing::warn!("Camera capture failed: {:#}", e),
        }
    }

    /// Pick an existing photo, then offer it for cropping.
    pub async fn start_gallery(&mut self) {
        match self.capture.pick_from_gallery().await {
            Ok(Some(image)) => {
                self.current_image = Some(image.clone());
                self.start_crop(image).await;
            }
            Ok(None) => tracing::debug!("No media selected"),
            Err(e) => tracing::warn!("Gallery pick failed: {:#}", e),
        }
    }

    async fn start_crop(&mut self, image: ImageHandle) {
        self.emit(ScreenEvent::CropGuidance {
            message: CROP_GUIDANCE.to_string(),
        });

        match self.capture.crop_image(image).await {
            Ok(Some(cropped)) => {
                tracing::debug!("Showing cropped image {:?}", cropped.path());
                self.emit(ScreenEvent::ImageShown {
                    image: cropped.path().to_path_buf(),
                });
                self.current_image = Some(cropped);
            }
            Ok(None) => tracing::info!("Crop cancelled, keeping uncropped image"),
            Err(e) => tracing::error!("Crop error: {:#}", e),
        }
    }

    /// Submit the current image and report the outcome.
    ///
    /// Returns the terminal state, or `None` when there was nothing to submit.
    pub async fn submit(&self) -> Option<ScanState> {
        let Some(image) = self.current_image.as_ref() else {
            self.emit(ScreenEvent::Toast {
                message: NO_IMAGE_MESSAGE.to_string(),
            });
            return None;
        };

        let payload = match ImagePayload::from_path(image.path()).await {
            Ok(payload) => payload,
            Err(e) => {
                let message = format!("{:#}", e);
                self.emit(ScreenEvent::Toast {
                    message: message.clone(),
                });
                return Some(OperationState::Error(message));
            }
        };

        let mut states = Box::pin(self.pipeline.scan(payload));
        let mut terminal = None;
        while let Some(state) = states.next().await {
            match &state {
                OperationState::Loading => {
                    self.emit(ScreenEvent::Progress { visible: true });
                }
                OperationState::Success(body) => {
                    self.emit(ScreenEvent::Progress { visible: false });
                    self.emit(ScreenEvent::Toast {
                        message: SCAN_SUCCESS_MESSAGE.to_string(),
                    });
                    self.emit(ScreenEvent::ShowResult {
                        label: body.label().map(String::from),
                        description: body.description().map(String::from),
                        image: image.path().to_path_buf(),
                    });
                }
                OperationState::Error(message) => {
                    self.emit(ScreenEvent::Progress { visible: false });
                    self.emit(ScreenEvent::Toast {
                        message: display_error_message(message),
                    });
                }
            }
            if state.is_terminal() {
                terminal = Some(state);
            }
        }
        terminal
    }
}
