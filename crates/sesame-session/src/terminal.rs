//! Terminal rendering of QR challenges.

use qrcode::QrCode;

/// Renders `data` as a block-character QR code, or `None` if it does not fit one.
pub fn render_qr(data: &str) -> Option<String> {
    QrCode::new(data.as_bytes()).ok().map(|qr| {
        qr.render::<char>()
            .quiet_zone(true)
            .module_dimensions(2, 1)
            .build()
    })
}

/// Prints a challenge for `session_id` to stdout.
pub fn print_qr(session_id: &str, data: &str) {
    match render_qr(data) {
        Some(rendered) => println!("[{}] Scan this QR code:\n{}", session_id, rendered),
        None => log::warn!("[{}] QR challenge could not be rendered for the terminal", session_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_square_block() {
        let rendered = render_qr("2@Zm9vYmFy,abc,def,ghi").unwrap();
        let lines: Vec<_> = rendered.lines().collect();
        assert!(lines.len() > 20);
        assert!(rendered.contains('█'));
    }
}
