/*!
    Source adapter for partially-available media.

    Opens a container whose payload may be incomplete: the structural
    header is staged with the payload block moved last, demuxing runs
    through a bounded chunked window, and packets truncated at a window
    boundary are restored from the sample index.
*/

mod atoms;
mod input;
mod recover;
mod window;

pub use atoms::{ATOM_HEADER_LEN, stage_header};
pub use input::FragmentedInput;
pub use recover::IndexEntry;
