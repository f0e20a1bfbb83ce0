use super::*;

fn close(a: Color, b: Color) -> bool {
    a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-4)
}

#[test]
fn implicit_conversions_cover_mismatched_kinds_only() {
    assert_eq!(ConvertKind::between(DataType::Color, DataType::Color), None);
    assert_eq!(
        ConvertKind::between(DataType::Value, DataType::Color),
        Some(ConvertKind::ValueToColor)
    );
    assert_eq!(
        ConvertKind::between(DataType::Vector, DataType::Value),
        Some(ConvertKind::VectorToValue)
    );
}

#[test]
fn parse_accepts_aliases() {
    assert_eq!(ConvertKind::parse("BW"), Some(ConvertKind::RgbToBw));
    assert_eq!(ConvertKind::parse(" premultiply "), Some(ConvertKind::KeyToPremul));
    assert_eq!(ConvertKind::parse("unpremultiply"), Some(ConvertKind::PremulToKey));
    assert_eq!(ConvertKind::parse("hsv"), None);
}

#[test]
fn sockets_follow_the_kind() {
    let op = ConvertOperation::new(ConvertKind::ValueToColor);
    assert_eq!(op.inputs(), &[DataType::Value]);
    assert_eq!(op.output(), Some(DataType::Color));

    let op = ConvertOperation::new(ConvertKind::RgbToBw);
    assert_eq!(op.inputs(), &[DataType::Color]);
    assert_eq!(op.output(), Some(DataType::Value));
}

#[test]
fn kind_conversions() {
    assert_eq!(ConvertKind::ValueToColor.apply([0.3, 9.0, 9.0, 9.0]), [0.3, 0.3, 0.3, 1.0]);
    assert!(close(
        ConvertKind::ColorToValue.apply([0.3, 0.6, 0.9, 0.5]),
        [0.6, 0.0, 0.0, 0.0]
    ));
    assert_eq!(ConvertKind::ColorToVector.apply([1.0, 2.0, 3.0, 0.5]), [1.0, 2.0, 3.0, 0.0]);
    assert_eq!(ConvertKind::VectorToColor.apply([1.0, 2.0, 3.0, 0.0]), [1.0, 2.0, 3.0, 1.0]);
    assert!(close(
        ConvertKind::RgbToBw.apply([1.0, 1.0, 1.0, 1.0]),
        [1.0, 0.0, 0.0, 0.0]
    ));
}

#[test]
fn color_model_conversions_invert_each_other() {
    let c = [0.2, 0.5, 0.7, 0.8];
    let back = ConvertKind::YuvToRgb.apply(ConvertKind::RgbToYuv.apply(c));
    assert!(close(back, c), "{back:?}");

    let premul = ConvertKind::KeyToPremul.apply(c);
    assert!(close(premul, [0.16, 0.4, 0.56, 0.8]));
    assert!(close(ConvertKind::PremulToKey.apply(premul), c));
    assert_eq!(ConvertKind::PremulToKey.apply([0.5, 0.5, 0.5, 0.0]), [0.0; 4]);
}
