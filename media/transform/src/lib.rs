/*!
    Per-stream filter graphs sitting between decoders and encoders.

    Video streams get `fps` conversion, a `setpts` rescale, and a
    downscale; audio streams get a resample onto the output rate. Both
    chains are driven through the same [`StreamFilter`] push/pull
    surface.
*/

mod audio;
mod graph;
mod video;

pub use audio::{audio_filter, audio_filter_spec};
pub use graph::StreamFilter;
pub use video::{pts_scale, video_filter, video_filter_spec};
