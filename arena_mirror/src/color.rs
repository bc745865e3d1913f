use arena_proto::Color;

/// Inverted grayscale token for a raw cell byte.
///
/// The channel is the unpadded lowercase hex of `255 - value` repeated three
/// times, so `0` maps to `#ffffff` and `250` to the shorthand `#555`.
pub fn color_of(value: u8) -> Color {
    let channel = format!("{:x}", 255 - value);
    Color::new(format!("#{}", channel.repeat(3)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extremes_are_distinct() {
        assert_eq!(color_of(0).as_str(), "#ffffff");
        assert_eq!(color_of(255).as_str(), "#000");
        assert_ne!(color_of(0), color_of(255));
    }

    #[test]
    fn single_digit_channels_stay_unpadded() {
        assert_eq!(color_of(250).as_str(), "#555");
        assert_eq!(color_of(5).as_str(), "#fafafa");
    }

    #[test]
    fn codec_is_deterministic_and_parseable() {
        for value in 0..=255u8 {
            let color = color_of(value);
            assert_eq!(color, color_of(value));
            assert!(color.to_rgb().is_some(), "unparseable token {}", color);
        }
    }
}
