mod common;

use std::cell::Cell;

use ndarray::{ArrayD, ArrayViewD, Axis as NdAxis, IxDyn};

use common::texture;
use unetile::model::from_fn;
use unetile::{
    Error, MeanFilterNet, ModelError, NTiles, NoNormalizer, NoProgress, PadAndCropResizer, UNet,
    UNetConfig,
};

fn unet_3d() -> UNet<MeanFilterNet> {
    let mut config = UNetConfig::new(3, 1, 1).unwrap();
    config.unet_n_depth = 2;
    let net = MeanFilterNet::from_config(&config).unwrap();
    UNet::new(config, net).unwrap()
}

fn predict(unet: &mut UNet<MeanFilterNet>, img: &ArrayD<f32>, n_tiles: NTiles) -> unetile::Result<ArrayD<f32>> {
    unet.predict_with(
        img.view(),
        "ZYX",
        &n_tiles,
        &mut NoNormalizer,
        &mut PadAndCropResizer::default(),
        &mut NoProgress,
    )
    .map(|p| p.output)
}

#[test]
fn too_few_entries_is_a_length_error() {
    let img = texture(&[8, 32, 32]);
    let err = predict(&mut unet_3d(), &img, NTiles::PerAxis(vec![2, 2])).unwrap_err();
    assert!(matches!(err, Error::TilesLength { expected: 3, got: 2 }));
}

#[test]
fn zero_entry_is_rejected() {
    let img = texture(&[8, 32, 32]);
    let err = predict(&mut unet_3d(), &img, NTiles::PerAxis(vec![1, 0, 1])).unwrap_err();
    assert!(matches!(err, Error::InvalidTiles(_)));
    let err = predict(&mut unet_3d(), &img, NTiles::Scalar(0)).unwrap_err();
    assert!(matches!(err, Error::InvalidTiles(_)));
}

#[test]
fn none_equals_all_ones() {
    let img = texture(&[8, 32, 32]);
    let mut unet = unet_3d();
    let a = predict(&mut unet, &img, NTiles::None).unwrap();
    let b = predict(&mut unet, &img, NTiles::PerAxis(vec![1, 1, 1])).unwrap();
    assert_eq!(a, b);
}

#[test]
fn parsed_requests_behave_like_typed_ones() {
    let img = texture(&[8, 32, 32]);
    let mut unet = unet_3d();
    let parsed: NTiles = "(1, 2, 2)".parse().unwrap();
    let a = predict(&mut unet, &img, parsed).unwrap();
    let b = predict(&mut unet, &img, NTiles::from(vec![1, 2, 2])).unwrap();
    assert_eq!(a, b);
    assert!(matches!("2,x".parse::<NTiles>(), Err(Error::TilesParse(_))));
}

#[test]
fn invalid_requests_never_reach_the_model() {
    let calls = Cell::new(0usize);
    let model = from_fn(|t: ArrayViewD<'_, f32>| -> Result<ArrayD<f32>, ModelError> {
        calls.set(calls.get() + 1);
        Ok(t.to_owned())
    });
    let mut unet = UNet::new(UNetConfig::new(2, 1, 1).unwrap(), model).unwrap();
    let img = texture(&[32, 32]);
    for n_tiles in [
        NTiles::PerAxis(vec![2, 2, 2]),
        NTiles::PerAxis(vec![0, 1]),
        NTiles::Scalar(0),
    ] {
        assert!(unet.predict(img.view(), "YX", &n_tiles).is_err());
    }
    // an image axis unknown to the network may not be tiled
    let stack = texture(&[3, 32, 32]);
    let err = unet
        .predict(stack.view(), "TYX", &NTiles::PerAxis(vec![2, 1, 1]))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTiles(_) | Error::ShapeMismatch(_)));
    assert_eq!(calls.get(), 0);
}

fn z_projection_config() -> UNetConfig {
    let mut config = UNetConfig::new(3, 1, 1).unwrap();
    config.unet_n_depth = 2;
    config.axes_out = Some("YX".to_string());
    config
}

fn max_over_z(t: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, ModelError> {
    Ok(t.fold_axis(NdAxis(0), f32::NEG_INFINITY, |m, &v| m.max(v)))
}

#[test]
fn network_that_drops_an_axis_yields_reduced_image() {
    let mut unet = UNet::new(z_projection_config(), from_fn(max_over_z)).unwrap();
    let img = texture(&[5, 40, 48]);
    let p = unet
        .predict_with(
            img.view(),
            "ZYX",
            &NTiles::PerAxis(vec![1, 2, 2]),
            &mut NoNormalizer,
            &mut PadAndCropResizer::default(),
            &mut NoProgress,
        )
        .unwrap();
    assert_eq!(p.axes.to_string(), "YX");
    assert_eq!(p.output.shape(), &[40, 48]);
    let expected = img.fold_axis(NdAxis(0), f32::NEG_INFINITY, |m, &v| m.max(v));
    assert_eq!(p.output, expected);
}

#[test]
fn lost_axis_cannot_be_tiled() {
    let mut unet = UNet::new(z_projection_config(), from_fn(max_over_z)).unwrap();
    let img = ArrayD::<f32>::zeros(IxDyn(&[8, 16, 16]));
    let err = unet
        .predict(img.view(), "ZYX", &NTiles::PerAxis(vec![2, 1, 1]))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTiles(_)));
}
