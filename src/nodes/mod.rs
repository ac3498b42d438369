//! The node library: small stateful reactive nodes sharing the
//! unit/channel/gate signal vocabulary.

pub mod aggregate;
pub mod buffer;
pub mod channel_filter;
pub mod delay;
pub mod differ;
pub mod interval;
pub mod lookup;
pub mod mixer;
pub mod playback;
pub mod sequencer;
pub mod unmixer;

pub use aggregate::{Aggregate, AggregateOptions};
pub use buffer::Buffer;
pub use channel_filter::{ChannelFilter, ChannelFilterOptions};
pub use delay::{Delay, DelayOptions, TimerMode, TimerSpec};
pub use differ::Differ;
pub use interval::{Interval, IntervalOptions};
pub use lookup::{Lookup, LookupOptions};
pub use mixer::{Mixer, MixerOptions, RouteSpec};
pub use playback::{Playback, PlaybackOptions, RunOut, Step};
pub use sequencer::{EndPolicy, Sequencer, SequencerOptions};
pub use unmixer::{Unmixer, UnmixerOptions};
