use crate::models::audio_models::FrameBlock;

/// De-interleaves frame blocks into left/right channel buffers.
///
/// Owns two scratch buffers that are reused across blocks, so steady-state
/// splitting does not allocate. Left is always channel 0. Right is channel 1
/// when the block has more than one channel and mirrors left otherwise;
/// channels beyond the second are ignored.
#[derive(Debug, Default)]
pub struct ChannelSplitter {
    left: Vec<f32>,
    right: Vec<f32>,
}

impl ChannelSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size the scratch buffers for `frames` frames per block.
    pub fn with_capacity(frames: usize) -> Self {
        Self {
            left: Vec::with_capacity(frames),
            right: Vec::with_capacity(frames),
        }
    }

    /// Split `block` and return `(left, right)`.
    ///
    /// A trailing partial frame is dropped. Mono blocks return the same
    /// buffer for both sides.
    pub fn split(&mut self, block: &FrameBlock<'_>) -> (&[f32], &[f32]) {
        self.left.clear();
        self.right.clear();

        let channels = block.channels as usize;
        if channels == 0 {
            return (self.left.as_slice(), self.right.as_slice());
        }

        if channels == 1 {
            self.left.extend_from_slice(&block.samples[..block.frame_count()]);
            return (self.left.as_slice(), self.left.as_slice());
        }

        for frame in block.samples.chunks_exact(channels) {
            self.left.push(frame[0]);
            self.right.push(frame[1]);
        }
        (self.left.as_slice(), self.right.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_stereo() {
        let mut splitter = ChannelSplitter::new();
        let samples = [1.0, 4.0, 2.0, 5.0, 3.0, 6.0];

        let (left, right) = splitter.split(&FrameBlock::new(&samples, 2));

        assert_eq!(left, &[1.0, 2.0, 3.0]);
        assert_eq!(right, &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn mono_mirrors_left() {
        let mut splitter = ChannelSplitter::new();
        let samples = [0.1, 0.2, 0.3];

        let (left, right) = splitter.split(&FrameBlock::new(&samples, 1));

        assert_eq!(left, &[0.1, 0.2, 0.3]);
        assert_eq!(left, right);
    }

    #[test]
    fn surround_takes_front_pair() {
        let mut splitter = ChannelSplitter::new();
        // 6-channel frames: FL FR C LFE SL SR
        let samples = [
            0.1, 0.2, 9.0, 9.0, 9.0, 9.0, //
            0.3, 0.4, 9.0, 9.0, 9.0, 9.0,
        ];

        let (left, right) = splitter.split(&FrameBlock::new(&samples, 6));

        assert_eq!(left, &[0.1, 0.3]);
        assert_eq!(right, &[0.2, 0.4]);
    }

    #[test]
    fn drops_partial_trailing_frame() {
        let mut splitter = ChannelSplitter::new();
        let samples = [1.0, 2.0, 3.0, 4.0, 5.0];

        let (left, right) = splitter.split(&FrameBlock::new(&samples, 2));

        assert_eq!(left, &[1.0, 3.0]);
        assert_eq!(right, &[2.0, 4.0]);
    }

    #[test]
    fn empty_and_zero_channel_blocks() {
        let mut splitter = ChannelSplitter::new();

        let (left, right) = splitter.split(&FrameBlock::new(&[], 2));
        assert!(left.is_empty() && right.is_empty());

        let (left, right) = splitter.split(&FrameBlock::new(&[1.0, 2.0], 0));
        assert!(left.is_empty() && right.is_empty());
    }

    #[test]
    fn reuses_buffers_between_blocks() {
        let mut splitter = ChannelSplitter::with_capacity(4);
        splitter.split(&FrameBlock::new(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], 2));

        let (left, right) = splitter.split(&FrameBlock::new(&[0.5, 0.25], 2));

        assert_eq!(left, &[0.5]);
        assert_eq!(right, &[0.25]);
    }
}
