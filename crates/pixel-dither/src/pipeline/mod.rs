//! Stage-selectable pixelate / upscale / dither pipeline.
//!
//! The image always travels the same chain:
//!
//! ```text
//! source --downscale(pixel)--> downscaled --x2--> upscaled1 --x2--> upscaled2 --xscale--> final
//! ```
//!
//! [`DitherStage`] picks the node where the dither method runs. Every edge
//! after that node is still applied to the dithered image, so an early stage
//! produces a coarse dither grain that the later upscales magnify.
//!
//! With `dither_scale != 1` the dither step is wrapped in a temporary
//! nearest-neighbor resize, which changes the grain size independently of
//! the pixel factor.

mod config;

pub use config::{DitherStage, PipelineConfig, PipelineConfigBuilder};

use std::borrow::Cow;

use tracing::debug;

use crate::dither::DitherMethod;
use crate::image::Image;
use crate::resample::{downscale_block_average, resize_nearest, resize_nearest_scale, upscale_nearest};

/// Nodes of the resampling chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Source,
    Downscaled,
    Upscaled1,
    Upscaled2,
    Final,
}

impl Node {
    fn next(self) -> Option<Node> {
        match self {
            Node::Source => Some(Node::Downscaled),
            Node::Downscaled => Some(Node::Upscaled1),
            Node::Upscaled1 => Some(Node::Upscaled2),
            Node::Upscaled2 => Some(Node::Final),
            Node::Final => None,
        }
    }
}

impl From<DitherStage> for Node {
    fn from(stage: DitherStage) -> Self {
        match stage {
            DitherStage::AfterDownscale => Node::Downscaled,
            DitherStage::AfterUpscale1 => Node::Upscaled1,
            DitherStage::AfterUpscale2 => Node::Upscaled2,
            DitherStage::AfterFinal => Node::Final,
        }
    }
}

/// Runs the configured pipeline over whole images.
///
/// A `Pipeline` is cheap to clone and holds no mutable state, so one
/// instance can process many frames, including from several threads.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one image.
    ///
    /// Walks the chain up to the configured stage, dithers there and applies
    /// the remaining edges. With [`DitherMethod::None`] the image at the
    /// stage node is returned as is: no quantization and no later upscales.
    pub fn run(&self, image: &Image) -> Image {
        let target = Node::from(self.config.stage());
        let mut node = Node::Source;
        let mut work = Cow::Borrowed(image);

        while node != target {
            let next = node.next().unwrap_or(target);
            work = Cow::Owned(self.edge(next, &work));
            node = next;
        }

        if self.config.method() == DitherMethod::None {
            debug!(stage = %self.config.stage(), "Dither method is none, returning stage image");
            return work.into_owned();
        }

        let mut work = self.dither(&work);
        while let Some(next) = node.next() {
            work = self.edge(next, &work);
            node = next;
        }

        debug!(
            width = work.width(),
            height = work.height(),
            "Pipeline complete"
        );
        work
    }

    /// Output `(width, height)` of [`run`](Self::run) for an input of the
    /// given size.
    pub fn output_dimensions(&self, width: usize, height: usize) -> (usize, usize) {
        let target = Node::from(self.config.stage());
        let last = if self.config.method() == DitherMethod::None {
            target
        } else {
            Node::Final
        };
        let mut node = Node::Source;
        let mut dims = (width, height);
        while node != last {
            let Some(next) = node.next() else { break };
            dims = self.edge_dimensions(next, dims);
            node = next;
        }
        dims
    }

    /// Apply the chain edge that ends at `to`.
    fn edge(&self, to: Node, image: &Image) -> Image {
        match to {
            Node::Source => image.clone(),
            Node::Downscaled => {
                downscale_block_average(image, self.config.pixel_factor() as usize)
            }
            Node::Upscaled1 | Node::Upscaled2 => upscale_nearest(image, 2),
            Node::Final => upscale_nearest(image, self.config.final_scale() as usize),
        }
    }

    fn edge_dimensions(&self, to: Node, (w, h): (usize, usize)) -> (usize, usize) {
        match to {
            Node::Source => (w, h),
            Node::Downscaled => {
                let f = self.config.pixel_factor() as usize;
                (w.div_ceil(f), h.div_ceil(f))
            }
            Node::Upscaled1 | Node::Upscaled2 => (w * 2, h * 2),
            Node::Final => {
                let f = self.config.final_scale() as usize;
                (w * f, h * f)
            }
        }
    }

    /// Run the dither method, optionally at a temporary scale.
    fn dither(&self, base: &Image) -> Image {
        let method = self.config.method();
        let levels = self.config.levels();
        let scale = self.config.dither_scale();

        if scale == 1.0 {
            debug!(
                %method,
                levels = levels.count(),
                width = base.width(),
                height = base.height(),
                "Dithering"
            );
            return method.apply(base, levels);
        }

        let scaled = resize_nearest_scale(base, scale);
        debug!(
            %method,
            levels = levels.count(),
            scale,
            width = scaled.width(),
            height = scaled.height(),
            "Dithering at temporary scale"
        );
        let dithered = method.apply(&scaled, levels);
        // Resize back to the exact base size; round(round(d * s) / s) can
        // miss `d` by one.
        resize_nearest(&dithered, base.width(), base.height())
    }
}
