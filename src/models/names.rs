// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// Class names: COCO defaults, or the `names` entry exported into the ONNX
// metadata by Ultralytics (`{0: 'person', 1: 'bicycle', ...}`)

use regex::Regex;

pub const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant",
    "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

/// Parse `{0: 'person', 1: 'bicycle'}` into an id-indexed list.
///
/// Returns `None` when nothing parses or ids are not contiguous from 0.
pub fn parse_names(metadata: &str) -> Option<Vec<String>> {
    let re = Regex::new(r#"(\d+)\s*:\s*['"]([^'"]*)['"]"#).ok()?;
    let mut pairs: Vec<(usize, String)> = re
        .captures_iter(metadata)
        .filter_map(|c| Some((c[1].parse().ok()?, c[2].to_string())))
        .collect();
    if pairs.is_empty() {
        return None;
    }
    pairs.sort_by_key(|(id, _)| *id);
    if pairs.iter().enumerate().any(|(i, (id, _))| i != *id) {
        return None;
    }
    Some(pairs.into_iter().map(|(_, name)| name).collect())
}

/// COCO names as owned strings
pub fn coco_names() -> Vec<String> {
    COCO_CLASSES.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coco_has_bear() {
        assert_eq!(COCO_CLASSES[21], "bear");
        assert_eq!(COCO_CLASSES[0], "person");
        assert_eq!(COCO_CLASSES[2], "car");
    }

    #[test]
    fn test_parse_ultralytics_metadata() {
        let names = parse_names("{0: 'person', 2: \"car\", 1: 'bicycle'}").unwrap();
        assert_eq!(names, vec!["person", "bicycle", "car"]);
    }

    #[test]
    fn test_parse_rejects_gaps_and_garbage() {
        assert!(parse_names("{0: 'person', 2: 'car'}").is_none());
        assert!(parse_names("not a dict").is_none());
    }
}
