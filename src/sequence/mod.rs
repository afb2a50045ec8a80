/// Frame Sequencer: parallel and sequential assembly of composited frames.
pub mod sequencer;
