//! Line-list curation: spectral masks, Kurucz matching and pair selection.

pub mod kurucz;
pub mod mask;
pub mod select;

pub use kurucz::{KuruczLine, KuruczMatch, match_kurucz_line, read_gfall};
pub use mask::{MaskRegion, line_is_masked, read_spectral_mask};
pub use select::{PairSelection, SelectionParams, select_pairs, write_line_pair_file, write_offset_histogram};
