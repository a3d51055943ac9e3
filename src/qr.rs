//! Terminal QR code for the served URL.

use qrcode::render::unicode;
use qrcode::QrCode;

/// Render `url` as a QR code of half-height unicode blocks.
///
/// Colours are inverted so the code scans on dark terminal themes. Returns
/// `None` if the URL cannot be encoded; the URL is printed as text anyway.
pub fn render_qr(url: &str) -> Option<String> {
    match QrCode::new(url.as_bytes()) {
        Ok(code) => Some(
            code.render::<unicode::Dense1x2>()
                .dark_color(unicode::Dense1x2::Light)
                .light_color(unicode::Dense1x2::Dark)
                .build(),
        ),
        Err(e) => {
            tracing::warn!(error = %e, url = %url, "Could not render QR code");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_multiline_block() {
        let qr = render_qr("https://192.168.1.20:8000").unwrap();
        assert!(qr.lines().count() > 10);
        assert!(qr.chars().any(|c| c == '▀' || c == '▄' || c == '█'));
    }

    #[test]
    fn test_oversized_payload_is_skipped() {
        let url = format!("https://{}", "a".repeat(8000));
        assert!(render_qr(&url).is_none());
    }
}
