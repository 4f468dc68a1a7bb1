//! Property-based tests for axis remapping and tile planning.
//!
//! - Permuting to another axis order and back is bit-identical
//! - Output axes after axis loss keep the relative image order
//! - Tile cores partition each axis, interior boundaries on block multiples

use ndarray::{ArrayD, IxDyn};
use proptest::prelude::*;

use unetile::core::tiling::{AxisRemapper, permute};
use unetile::{Axis, AxisOrder, TilePlanner};

/// Strategy for a shuffled subset of the axis alphabet (always with C).
fn axis_order_strategy() -> impl Strategy<Value = Vec<Axis>> {
    prop::sample::subsequence(vec![Axis::S, Axis::T, Axis::Z, Axis::Y, Axis::X], 1..=5)
        .prop_map(|mut axes| {
            axes.push(Axis::C);
            axes
        })
        .prop_shuffle()
}

fn ramp(shape: &[usize]) -> ArrayD<f32> {
    let n: usize = shape.iter().product();
    ArrayD::from_shape_vec(IxDyn(shape), (0..n).map(|v| v as f32 * 0.25 - 3.0).collect())
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        max_shrink_iters: 100,
        ..ProptestConfig::default()
    })]

    /// Property: permute there and back reproduces the array exactly.
    #[test]
    fn prop_permute_round_trip(
        from in axis_order_strategy(),
        seed in any::<u64>(),
        lens in prop::collection::vec(1usize..4, 6),
    ) {
        let n = from.len();
        let mut to = from.clone();
        // deterministic rotation + swap driven by the seed
        to.rotate_left((seed as usize) % n);
        if n > 1 {
            to.swap(0, (seed as usize / 7) % n);
        }
        let from = AxisOrder::new(from).unwrap();
        let to = AxisOrder::new(to).unwrap();

        let x = ramp(&lens[..n]);
        let y = permute(x.clone(), &from, &to).unwrap();
        let back = permute(y, &to, &from).unwrap();
        prop_assert_eq!(back, x);
    }

    /// Property: img_axes_out is img_axes_in without the lost axes, in order.
    #[test]
    fn prop_axis_loss_preserves_order(
        img in axis_order_strategy(),
        drop_z in any::<bool>(),
    ) {
        let img = AxisOrder::new(img).unwrap();
        let net_in: AxisOrder = "ZYXC".parse().unwrap();
        let net_out: AxisOrder = if drop_z { "YXC" } else { "ZYXC" }.parse().unwrap();
        let remapper = AxisRemapper::new(img.clone(), net_in, net_out).unwrap();

        let expected: Vec<Axis> = img
            .iter()
            .filter(|a| !(drop_z && *a == Axis::Z))
            .collect();
        prop_assert_eq!(remapper.img_axes_out().axes(), expected.as_slice());
    }

    /// Property: cores tile the axis exactly and only the last core may be
    /// shorter than a block multiple.
    #[test]
    fn prop_cores_partition_axis(
        len in 1usize..600,
        count in 1usize..9,
        depth in 1usize..5,
    ) {
        let block = 1usize << depth;
        let planner = TilePlanner::new(vec![block], vec![9], vec![true]).unwrap();
        let plan = planner.plan(&[len], &[count]).unwrap();
        let cores = plan.cores(0);

        prop_assert_eq!(cores[0].start, 0);
        prop_assert_eq!(cores[cores.len() - 1].end, len);
        for w in cores.windows(2) {
            prop_assert_eq!(w[0].end, w[1].start);
        }
        for c in &cores[..cores.len() - 1] {
            prop_assert_eq!(c.len() % block, 0);
        }
        for t in 0..cores.len() {
            let w = plan.window(0, t);
            prop_assert!(w.start <= w.core_start && w.core_stop <= w.stop && w.stop <= len);
        }
    }
}
