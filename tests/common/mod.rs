#![allow(dead_code)]

use rusty_backprop::trainer::Dataset;
use rusty_backprop::Tensor;

/// Two one-hot patterns that map onto themselves, `copies` times each.
pub fn toy_data(copies: usize) -> Dataset {
    let a = Tensor::column(&[1., 0.]);
    let b = Tensor::column(&[0., 1.]);
    let mut data = Dataset::default();
    for _ in 0..copies {
        data.inputs.push(a.clone());
        data.targets.push(a.clone());
        data.inputs.push(b.clone());
        data.targets.push(b.clone());
    }
    data
}

/// Three noisy clusters in four dimensions, labelled by cluster.
pub fn clusters(per_class: usize) -> Dataset {
    let centres = [[1., 0., 0., 0.5], [0., 1., 0., 0.5], [0., 0., 1., 0.5]];
    let mut inputs = Vec::new();
    let mut labels = Vec::new();
    for i in 0..per_class {
        for (label, centre) in centres.iter().enumerate() {
            // deterministic jitter in [-0.15, 0.15]
            let jitter = ((i * 7 + label * 3) % 11) as f32 / 10. * 0.3 - 0.15;
            let values: Vec<f32> = centre.iter().map(|c| c + jitter).collect();
            inputs.push(Tensor::column(&values));
            labels.push(label);
        }
    }
    Dataset::from_labels(inputs, &labels, centres.len()).unwrap()
}

pub fn check(expected: &[f32], output: &[f32], tolerance: f32, id: &str) {
    assert_eq!(expected.len(), output.len(), "{} differ in length", id);
    for (e, o) in expected.iter().zip(output) {
        assert!(
            (e - o).abs() <= tolerance,
            "Incorrect {}.\nexpected: {:?}\nreceived: {:?}",
            id,
            expected,
            output
        );
    }
}
