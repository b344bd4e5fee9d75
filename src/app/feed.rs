//! Batch feed handling for `FlowApp`.
//!
//! Fetches run on a worker thread. The result comes back over a channel
//! and is applied on the next frame.

use std::sync::mpsc::{self, TryRecvError};

use eframe::egui;

use h2_flow_viz::ledger::feed::source_for;
use h2_flow_viz::ledger::Batch;
use h2_flow_viz::Result;

use super::FlowApp;

/// State of an outstanding fetch.
#[derive(Debug)]
enum FetchPoll {
    Pending,
    Done(Result<Vec<Batch>>),
    /// The worker went away without sending anything.
    Lost,
}

fn poll_fetch(rx: &mpsc::Receiver<Result<Vec<Batch>>>) -> FetchPoll {
    match rx.try_recv() {
        Ok(result) => FetchPoll::Done(result),
        Err(TryRecvError::Empty) => FetchPoll::Pending,
        Err(TryRecvError::Disconnected) => FetchPoll::Lost,
    }
}

impl FlowApp {
    /// Start a background fetch from the configured feed.
    pub fn refresh(&mut self, ctx: &egui::Context) {
        if self.loading {
            return;
        }
        let source = match source_for(&self.config.feed) {
            Ok(source) => source,
            Err(e) => {
                log::warn!("{}", e);
                self.feed_error = Some(e.to_string());
                return;
            }
        };
        self.loading = true;
        self.feed_error = None;

        let (tx, rx) = mpsc::channel();
        self.fetch_rx = Some(rx);
        let ctx = ctx.clone();

        std::thread::spawn(move || {
            let _ = tx.send(source.fetch_batches());
            ctx.request_repaint();
        });
    }

    /// Apply a finished fetch, if any.
    pub fn check_fetch(&mut self) {
        let Some(rx) = &self.fetch_rx else {
            return;
        };
        let result = match poll_fetch(rx) {
            FetchPoll::Pending => return,
            FetchPoll::Done(result) => result,
            FetchPoll::Lost => {
                log::warn!("batch fetch thread exited without a result");
                Err(h2_flow_viz::VizError::Feed("fetch thread exited".into()))
            }
        };
        self.fetch_rx = None;
        self.loading = false;

        match result {
            Ok(batches) => {
                self.status = Some(format!("{} batches loaded", batches.len()));
                if let Some(viz) = self.viz.as_mut() {
                    viz.load(batches.clone());
                }
                self.batches = batches;
            }
            Err(e) => {
                log::warn!("batch fetch failed: {}", e);
                self.feed_error = Some(e.to_string());
            }
        }
    }
}
