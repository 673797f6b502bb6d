use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error("clipboard unavailable: {0}")]
    Clipboard(String),
}

/// Where a shared link ends up.
pub trait ShareTarget: Send + Sync {
    /// Returns the confirmation shown to the user on success.
    fn share(&self, url: &str) -> Result<String, ShareError>;
}

/// Terminals have no native share sheet, so sharing copies to the clipboard.
#[derive(Debug, Default)]
pub struct ClipboardShare;

impl ShareTarget for ClipboardShare {
    fn share(&self, url: &str) -> Result<String, ShareError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|err| ShareError::Clipboard(err.to_string()))?;
        clipboard
            .set_text(url.to_string())
            .map_err(|err| ShareError::Clipboard(err.to_string()))?;
        Ok("Link copied to clipboard".to_string())
    }
}

/// Opens a URL in the system browser. Failures are logged only.
pub fn open_in_browser(url: &str) -> bool {
    match webbrowser::open(url) {
        Ok(()) => true,
        Err(err) => {
            warn!(url, error = %err, "failed to open browser");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingShare {
        urls: Mutex<Vec<String>>,
    }

    impl ShareTarget for RecordingShare {
        fn share(&self, url: &str) -> Result<String, ShareError> {
            self.urls.lock().push(url.to_string());
            Ok("ok".into())
        }
    }

    fn share_through(target: &dyn ShareTarget, url: &str) -> Result<String, ShareError> {
        target.share(url)
    }

    #[test]
    fn shares_through_trait_object() {
        let target = RecordingShare::default();
        assert_eq!(share_through(&target, "https://example.com").unwrap(), "ok");
        assert_eq!(target.urls.lock().as_slice(), ["https://example.com".to_string()]);
    }
}
