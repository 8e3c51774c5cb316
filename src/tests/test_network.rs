use crate::network::QNetwork;
use crate::optimizer::{Adam, OptimizerWrapper, SGD};
use ndarray::{array, Array2};

fn small_network() -> QNetwork {
    QNetwork::new(2, &[8], 3, OptimizerWrapper::SGD(SGD::new())).unwrap()
}

#[test]
fn test_output_shape() {
    let network = small_network();
    let out = network.predict(array![0.5, -0.5].view());
    assert_eq!(out.len(), 3);

    let batch = Array2::zeros((5, 2));
    let out = network.predict_batch(batch.view());
    assert_eq!(out.dim(), (5, 3));
}

#[test]
fn test_predict_is_pure() {
    let network = small_network();
    let input = array![0.3, 0.7];
    let first = network.predict(input.view());
    let second = network.predict(input.view());
    assert_eq!(first, second);
}

#[test]
fn test_parameters_round_trip() {
    let source = small_network();
    let mut sink = small_network();
    sink.set_parameters(&source.parameters()).unwrap();
    assert_eq!(source.parameters(), sink.parameters());

    let input = array![0.1, 0.9];
    assert_eq!(source.predict(input.view()), sink.predict(input.view()));
}

#[test]
fn test_set_parameters_rejects_wrong_shape() {
    let mut network = small_network();
    let other = QNetwork::new(2, &[4], 3, OptimizerWrapper::SGD(SGD::new())).unwrap();
    assert!(network.set_parameters(&other.parameters()).is_err());

    let fewer = QNetwork::new(2, &[], 3, OptimizerWrapper::SGD(SGD::new())).unwrap();
    assert!(network.set_parameters(&fewer.parameters()).is_err());
}

#[test]
fn test_fit_moves_prediction_toward_target() {
    let mut network = QNetwork::new(2, &[16], 2, OptimizerWrapper::Adam(Adam::default())).unwrap();
    let inputs = array![[0.2, 0.8], [0.9, 0.1]];
    let targets = array![[1.0, -1.0], [-1.0, 1.0]];

    let before = network.predict_batch(inputs.view());
    let initial_error = (&before - &targets).mapv(|x| x * x).sum();
    for _ in 0..200 {
        network.fit_batch(inputs.view(), targets.view(), 0.01);
    }
    let after = network.predict_batch(inputs.view());
    let final_error = (&after - &targets).mapv(|x| x * x).sum();
    assert!(final_error < initial_error);
}

#[test]
fn test_invalid_layer_sizes_rejected() {
    assert!(QNetwork::new(0, &[8], 2, OptimizerWrapper::SGD(SGD::new())).is_err());
    assert!(QNetwork::new(4, &[8], 0, OptimizerWrapper::SGD(SGD::new())).is_err());
    assert!(QNetwork::new(4, &[0], 2, OptimizerWrapper::SGD(SGD::new())).is_err());
}

#[test]
fn test_topology_accessors() {
    let network = QNetwork::new(6, &[32, 16], 4, OptimizerWrapper::SGD(SGD::new())).unwrap();
    assert_eq!(network.input_size(), 6);
    assert_eq!(network.output_size(), 4);
    assert_eq!(network.layers().len(), 3);
}
