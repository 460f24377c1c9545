//! Tests that check for consistency between `apply` and `derivatives`.

use ndarray::prelude::*;
use ndarray::IntoDimension;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;

use roi_align::layers::RoiAlignLayer;
use roi_align::*;

fn test_layer<L, D>(layer: L, input_shape: D, error_limit: f64)
where
    D: IntoDimension,
    L: Layer<f64, D::Dim>,
{
    let input_shape = input_shape.into_dimension();
    let output_shape = layer.output_shape(input_shape.clone()).unwrap();
    let mut rng = StdRng::seed_from_u64(0x5eed);

    let n = layer.num_params();
    let params = Array::random_using(n, Uniform::new(0.0, 1.0), &mut rng);
    let mut x = Array::random_using(input_shape.clone(), Uniform::new(0.0, 1.0), &mut rng);
    println!("testing layer {layer:#?} with input {x:#?}");
    let mut z = Array::zeros(output_shape.clone());
    layer.apply(params.view(), x.view(), z.view_mut()).unwrap();

    let dz = Array::random_using(z.raw_dim(), Uniform::new(-0.1, 0.1), &mut rng);
    let mut dp = Array::zeros(n);
    let dx = layer
        .derivatives(params.view(), x.view(), dz.view(), dp.view_mut())
        .unwrap();

    let h = 0.0003;

    fn err(claimed: f64, measured: f64) -> f64 {
        let d = measured.abs().max(0.01);
        (claimed - measured).abs() / d
    }

    let mut z_minus = Array::zeros(output_shape.clone());
    let mut z_plus = Array::zeros(output_shape);
    for i in ndarray::indices(input_shape) {
        // check accuracy of derivative at input x[i]
        let i = i.into_dimension();
        let saved = x[i.clone()];
        x[i.clone()] = saved - h;
        layer.apply(params.view(), x.view(), z_minus.view_mut()).unwrap();
        x[i.clone()] = saved + h;
        layer.apply(params.view(), x.view(), z_plus.view_mut()).unwrap();
        x[i.clone()] = saved;

        let claimed = dx[i.clone()];
        let measured = ((&z_plus - &z_minus) * (1.0 / (2.0 * h)) * &dz).sum();

        let error = err(claimed, measured);
        assert!(
            error <= error_limit,
            "input element {i:?} computed derivative = {claimed}, measured = {measured}, error = {error}, limit = {error_limit}"
        );
    }
}

fn layer(pooled: (usize, usize), scale: f32, rois: Array2<f64>) -> RoiAlignLayer<f64> {
    let op = RoiAlign::new(RoiAlignParams::new(pooled, scale).unwrap()).unwrap();
    RoiAlignLayer::new(op, rois).unwrap()
}

#[test]
fn test_layer_consistency() {
    test_layer(
        layer((2, 2), 1.0, array![[0.0, 0.0, 0.0, 4.0, 4.0]]),
        (1, 1, 8, 6),
        1e-6,
    );
    test_layer(
        layer((3, 3), 0.5, array![[0.0, 1.0, 1.5, 7.0, 9.0], [0.0, 0.5, 0.5, 3.3, 2.1]]),
        (1, 2, 6, 5),
        1e-6,
    );
    // overlapping regions on two images, one sticking out past the edge
    test_layer(
        layer(
            (4, 3),
            1.0,
            array![
                [1.0, 0.25, 0.75, 3.5, 2.5],
                [0.0, 1.0, 1.0, 6.0, 6.0],
                [1.0, 0.0, 0.0, 3.0, 3.0],
            ],
        ),
        (2, 3, 5, 4),
        1e-6,
    );
    // inverted region and a single pooled row
    test_layer(
        layer((1, 3), 1.0, array![[0.0, 3.0, 2.0, 1.0, 1.0], [0.0, 0.2, 0.7, 2.6, 0.7]]),
        (1, 1, 4, 4),
        1e-6,
    );
    // sample points in the extrapolated band past the last grid line
    test_layer(
        layer((2, 2), 1.0, array![[0.0, 0.0, 0.0, 4.5, 3.5]]),
        (1, 1, 4, 5),
        1e-6,
    );
}

#[test]
fn test_layer_shapes() {
    let l = layer((7, 7), 0.0625, Array2::zeros((10, 5)));
    assert_eq!(l.output_shape(Ix4(2, 256, 32, 32)).unwrap(), Ix4(10, 256, 7, 7));
    assert_eq!(l.num_params(), 0);
    assert_eq!(l.rois().nrows(), 10);

    let op = RoiAlign::<f64>::new(RoiAlignParams::new((7, 7), 1.0).unwrap()).unwrap();
    assert!(RoiAlignLayer::new(op, Array2::zeros((10, 4))).is_err());
}

#[test]
fn test_layer_rejects_missing_image() {
    let l = layer((2, 2), 1.0, array![[3.0, 0.0, 0.0, 1.0, 1.0]]);
    let x = Array4::<f64>::zeros((2, 1, 4, 4));
    let mut y = Array4::zeros((1, 1, 2, 2));
    let err = l.apply(Array1::zeros(0).view(), x.view(), y.view_mut());
    assert_eq!(
        err,
        Err(RoiAlignError::InvalidRegion {
            region: 0,
            batch_index: 3.0,
            batch_size: 2
        })
    );
}
