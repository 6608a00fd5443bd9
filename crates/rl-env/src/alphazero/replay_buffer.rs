//! Bounded replay buffer and on-disk replay log.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use rand::Rng;
use thiserror::Error;

use super::ReplaySample;

/// Asked for a larger batch than the buffer holds. Training defers until
/// self-play has produced enough data.
#[derive(Clone, Copy, Debug, Error, PartialEq)]
#[error("replay buffer holds {available} samples, {requested} requested")]
pub struct BufferUnderflow {
    pub requested: usize,
    pub available: usize,
}

/// FIFO replay buffer with whole-game eviction.
///
/// Samples arrive one game at a time and leave the same way: when pushing a
/// game overflows `capacity`, the oldest complete games are dropped until the
/// buffer fits again. Partial games never linger with their labels orphaned.
#[derive(Clone, Debug)]
pub struct ReplayBuffer {
    capacity: usize,
    samples: VecDeque<ReplaySample>,
    game_sizes: VecDeque<usize>,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "replay capacity must be positive");
        Self {
            capacity,
            samples: VecDeque::new(),
            game_sizes: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn num_games(&self) -> usize {
        self.game_sizes.len()
    }

    /// Append all samples of one finished game, evicting the oldest games
    /// first if the buffer would exceed capacity. A single game larger than
    /// the whole buffer is truncated to the most recent samples.
    pub fn push_game(&mut self, mut game: Vec<ReplaySample>) {
        if game.len() > self.capacity {
            game.drain(..game.len() - self.capacity);
        }
        while !self.game_sizes.is_empty() && self.samples.len() + game.len() > self.capacity {
            let evict = self.game_sizes.pop_front().unwrap();
            self.samples.drain(..evict);
        }
        self.game_sizes.push_back(game.len());
        self.samples.extend(game);
    }

    /// Sample `batch_size` distinct examples uniformly without replacement.
    pub fn sample(
        &self,
        rng: &mut impl Rng,
        batch_size: usize,
    ) -> Result<Vec<&ReplaySample>, BufferUnderflow> {
        if batch_size > self.samples.len() {
            return Err(BufferUnderflow {
                requested: batch_size,
                available: self.samples.len(),
            });
        }
        let picks = rand::seq::index::sample(rng, self.samples.len(), batch_size);
        Ok(picks.iter().map(|i| &self.samples[i]).collect())
    }
}

/// Append-only JSONL log of every sample ever produced, one sample per line.
/// Survives buffer eviction; lets a later run rebuild its buffer from disk.
pub struct ReplayLog {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl ReplayLog {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, samples: &[ReplaySample]) -> std::io::Result<()> {
        for sample in samples {
            serde_json::to_writer(&mut self.writer, sample)?;
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush()
    }

    /// Read every sample back, in write order.
    pub fn load(path: &Path) -> std::io::Result<Vec<ReplaySample>> {
        let reader = BufReader::new(File::open(path)?);
        let mut samples = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            samples.push(serde_json::from_str(&line)?);
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Observation;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample(game_id: u64, tag: f32) -> ReplaySample {
        ReplaySample {
            observation: Observation::from_vec(vec![tag; 4]),
            policy: vec![0.5, 0.5],
            value: 1.0,
            game_id,
        }
    }

    fn game(game_id: u64, len: usize) -> Vec<ReplaySample> {
        (0..len).map(|i| sample(game_id, i as f32)).collect()
    }

    #[test]
    fn test_push_and_len() {
        let mut buffer = ReplayBuffer::new(100);
        buffer.push_game(game(0, 10));
        buffer.push_game(game(1, 7));
        assert_eq!(buffer.len(), 17);
        assert_eq!(buffer.num_games(), 2);
    }

    #[test]
    fn test_eviction_is_whole_games() {
        let mut buffer = ReplayBuffer::new(20);
        buffer.push_game(game(0, 10));
        buffer.push_game(game(1, 8));
        // Overflows by 3: game 0 goes entirely, not just 3 samples.
        buffer.push_game(game(2, 5));
        assert_eq!(buffer.len(), 13);
        assert_eq!(buffer.num_games(), 2);
        assert!(buffer.sample(&mut StdRng::seed_from_u64(0), 13)
            .unwrap()
            .iter()
            .all(|s| s.game_id != 0));
    }

    #[test]
    fn test_oversized_game_truncates() {
        let mut buffer = ReplayBuffer::new(5);
        buffer.push_game(game(0, 9));
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.num_games(), 1);
    }

    #[test]
    fn test_sample_underflow() {
        let mut buffer = ReplayBuffer::new(100);
        buffer.push_game(game(0, 3));
        let err = buffer
            .sample(&mut StdRng::seed_from_u64(0), 4)
            .unwrap_err();
        assert_eq!(
            err,
            BufferUnderflow {
                requested: 4,
                available: 3
            }
        );
    }

    #[test]
    fn test_sample_without_replacement() {
        let mut buffer = ReplayBuffer::new(100);
        for g in 0..4 {
            buffer.push_game(game(g, 5));
        }
        let mut rng = StdRng::seed_from_u64(17);
        let batch = buffer.sample(&mut rng, 20).unwrap();
        assert_eq!(batch.len(), 20);
        // Every sample picked exactly once.
        let mut seen: Vec<*const ReplaySample> =
            batch.iter().map(|s| *s as *const ReplaySample).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 20);
    }

    #[test]
    fn test_log_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replay.jsonl");

        let samples = game(7, 3);
        {
            let mut log = ReplayLog::open(&path).unwrap();
            log.append(&samples).unwrap();
        }
        // Append mode: a second open adds to the same file.
        {
            let mut log = ReplayLog::open(&path).unwrap();
            log.append(&samples[..1]).unwrap();
        }

        let loaded = ReplayLog::load(&path).unwrap();
        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded[..3], samples[..]);
        assert_eq!(loaded[3], samples[0]);
    }
}
