use anyhow::{Context, Result};
use ndarray::prelude::*;
use tracing::Level;

use roi_align::{GradReq, RoiAlign, RoiAlignParams};

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let x = Array::from_shape_fn((1, 1, 8, 6), |(_, _, i, j)| (i * 6 + j) as f32);
    let rois = array![[0.0f32, 0.0, 0.0, 4.0, 4.0], [0.0, 1.0, 2.5, 5.5, 6.0]];
    println!("feature map:\n{}", x.slice(s![0, 0, .., ..]));

    for scale in [1.0, 0.7] {
        let params = RoiAlignParams::new((2, 2), scale)?;
        let op = RoiAlign::<f32>::new(params)?;
        let y = op
            .forward(x.view(), rois.view())
            .with_context(|| format!("forward at scale {scale}"))?;
        for (r, pooled) in y.outer_iter().enumerate() {
            println!("scale {scale}, region {r}:\n{}", pooled.index_axis(Axis(0), 0));
        }

        let dy = Array4::ones(y.raw_dim());
        let mut dx = Array4::zeros(x.raw_dim());
        op.backward(dy.view(), rois.view(), dx.view_mut(), GradReq::Write)
            .with_context(|| format!("backward at scale {scale}"))?;
        println!("scale {scale}, gradient:\n{}", dx.slice(s![0, 0, .., ..]));
    }
    Ok(())
}
