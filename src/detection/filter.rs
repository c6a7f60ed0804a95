// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// Detection filter: confidence threshold + target classes, alert-class check
use super::types::Detection;
use crate::config::TargetClasses;

/// Filter result for one frame
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterOutcome {
    pub kept: Vec<Detection>, // input order preserved
    pub alert_triggered: bool,
}

/// Keep `confidence >= threshold` detections of a target class.
///
/// `alert_triggered` is true iff a kept detection is of `alert_class`.
pub fn filter(
    raw: &[Detection],
    confidence_threshold: f32,
    target_classes: &TargetClasses,
    alert_class: &str,
) -> FilterOutcome {
    let kept: Vec<Detection> = raw
        .iter()
        .filter(|d| d.confidence >= confidence_threshold && target_classes.contains(&d.class_name))
        .cloned()
        .collect();
    let alert_triggered = kept.iter().any(|d| d.class_name == alert_class);

    FilterOutcome {
        kept,
        alert_triggered,
    }
}

/// Filter parameters fixed at startup
#[derive(Clone, Debug)]
pub struct DetectionFilter {
    confidence_threshold: f32,
    target_classes: TargetClasses,
    alert_class: String,
}

impl DetectionFilter {
    pub fn new(
        confidence_threshold: f32,
        target_classes: TargetClasses,
        alert_class: impl Into<String>,
    ) -> Self {
        Self {
            confidence_threshold,
            target_classes,
            alert_class: alert_class.into(),
        }
    }

    pub fn apply(&self, raw: &[Detection]) -> FilterOutcome {
        filter(
            raw,
            self.confidence_threshold,
            &self.target_classes,
            &self.alert_class,
        )
    }

    pub fn target_classes(&self) -> &TargetClasses {
        &self.target_classes
    }

    pub fn alert_class(&self) -> &str {
        &self.alert_class
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BBox;

    fn det(class: &str, conf: f32) -> Detection {
        Detection::new(class, conf, BBox::new(10., 10., 50., 50.))
    }

    fn targets() -> TargetClasses {
        TargetClasses::default() // bear, person, car
    }

    #[test]
    fn test_below_threshold_excluded_for_every_class() {
        let raw = vec![det("bear", 0.49), det("person", 0.1), det("car", 0.0)];
        let out = filter(&raw, 0.5, &targets(), "bear");
        assert!(out.kept.is_empty());
        assert!(!out.alert_triggered);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let out = filter(&[det("car", 0.5)], 0.5, &targets(), "bear");
        assert_eq!(out.kept.len(), 1);
    }

    #[test]
    fn test_non_target_excluded_regardless_of_confidence() {
        let raw = vec![det("dog", 1.0), det("cat", 0.99), det("Bear", 0.95)];
        let out = filter(&raw, 0.5, &targets(), "bear");
        assert!(out.kept.is_empty());
        assert!(!out.alert_triggered);
    }

    #[test]
    fn test_kept_preserves_input_order() {
        let raw = vec![
            det("car", 0.7),
            det("dog", 0.9),
            det("bear", 0.8),
            det("person", 0.3),
            det("person", 0.6),
        ];
        let out = filter(&raw, 0.5, &targets(), "bear");
        let names: Vec<_> = out.kept.iter().map(|d| d.class_name.as_str()).collect();
        assert_eq!(names, vec!["car", "bear", "person"]);
        assert!(out.alert_triggered);
    }

    #[test]
    fn test_alert_truth_table() {
        // every list over {bear, person, dog} x {high, low} with length <= 2
        let atoms = [
            ("bear", 0.9),
            ("bear", 0.2),
            ("person", 0.9),
            ("person", 0.2),
            ("dog", 0.9),
            ("dog", 0.2),
        ];
        let mut lists: Vec<Vec<Detection>> = vec![vec![]];
        for a in atoms {
            lists.push(vec![det(a.0, a.1)]);
            for b in atoms {
                lists.push(vec![det(a.0, a.1), det(b.0, b.1)]);
            }
        }

        for raw in &lists {
            let out = filter(raw, 0.5, &targets(), "bear");
            let expected = raw.iter().any(|d| d.class_name == "bear" && d.confidence >= 0.5);
            assert_eq!(out.alert_triggered, expected, "input: {:?}", raw);
            assert!(out.kept.iter().all(|d| d.confidence >= 0.5 && d.class_name != "dog"));
        }
    }

    #[test]
    fn test_alert_only_filter() {
        let f = DetectionFilter::new(0.5, targets().only("bear"), "bear");
        let out = f.apply(&[det("person", 0.9), det("bear", 0.9)]);
        assert_eq!(out.kept.len(), 1);
        assert!(out.alert_triggered);
    }

    #[test]
    fn test_inputs_untouched() {
        let raw = vec![det("bear", 0.9), det("dog", 0.9)];
        let before = raw.clone();
        let _ = filter(&raw, 0.5, &targets(), "bear");
        assert_eq!(raw, before);
    }
}
