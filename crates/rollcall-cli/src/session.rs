//! Per-run attendance state: the gallery, the dedup set, and the one
//! retained unknown face awaiting enrollment.
//!
//! All mutable loop state lives here, owned by the capture loop and
//! passed explicitly to each step — no process-wide globals.

use chrono::{DateTime, Local};
use rollcall_core::{
    BoundingBox, Detection, Embedding, FirstMatchMatcher, Gallery, Identity, Matcher,
};
use rollcall_sheets::{AttendanceRow, AttendanceSink};
use rollcall_store::{GalleryStore, StoreError};
use std::collections::HashSet;

/// What to draw for one face in the current frame.
#[derive(Debug, Clone)]
pub struct FaceLabel {
    pub bbox: BoundingBox,
    /// `Some(name)` for a recognized face, `None` for an unknown one.
    pub name: Option<String>,
}

/// Operator-supplied identity metadata collected during enrollment.
#[derive(Debug, Clone)]
pub struct EnrollmentDetails {
    pub name: String,
    pub roll_number: String,
    pub section: String,
}

/// Mutable state for one attendance run.
pub struct Session {
    gallery: Gallery,
    /// Names already logged this run. Not persisted: a restart re-admits
    /// every identity once.
    logged: HashSet<String>,
    /// The most recently seen unknown face. Multiple unknowns in one
    /// frame: the last one wins.
    pending_unknown: Option<Embedding>,
    matcher: FirstMatchMatcher,
    threshold: f32,
}

impl Session {
    pub fn new(gallery: Gallery, threshold: f32) -> Self {
        Self {
            gallery,
            logged: HashSet::new(),
            pending_unknown: None,
            matcher: FirstMatchMatcher,
            threshold,
        }
    }

    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    pub fn has_pending_unknown(&self) -> bool {
        self.pending_unknown.is_some()
    }

    /// Process one frame's detections: resolve each against the gallery,
    /// log first sightings to the sink, and retain the last unknown.
    ///
    /// A failed sink append is logged and the name stays unmarked, so
    /// the event is retried the next time that identity is seen.
    pub fn observe(
        &mut self,
        detections: &[Detection],
        sink: &mut dyn AttendanceSink,
        now: DateTime<Local>,
    ) -> Vec<FaceLabel> {
        let mut labels = Vec::with_capacity(detections.len());

        for detection in detections {
            match self
                .matcher
                .find(&detection.embedding, &self.gallery, self.threshold)
            {
                Some(identity) => {
                    let name = identity.name.clone();
                    if !self.logged.contains(&name) {
                        let row = AttendanceRow::new(
                            &identity.name,
                            &identity.roll_number,
                            &identity.section,
                            now,
                        );
                        match sink.append_row(&row) {
                            Ok(()) => {
                                tracing::info!(name = %name, "attendance logged");
                                self.logged.insert(name.clone());
                            }
                            Err(e) => {
                                tracing::warn!(
                                    name = %name,
                                    error = %e,
                                    "attendance append failed; will retry on next sighting"
                                );
                            }
                        }
                    }
                    labels.push(FaceLabel {
                        bbox: detection.bbox,
                        name: Some(name),
                    });
                }
                None => {
                    self.pending_unknown = Some(detection.embedding.clone());
                    labels.push(FaceLabel {
                        bbox: detection.bbox,
                        name: None,
                    });
                }
            }
        }

        labels
    }

    /// Enroll the retained unknown face under the given details.
    ///
    /// Persists the identity, makes it matchable immediately, and logs
    /// one attendance event. A failed record write restores the pending
    /// face so the operator can retry; a failed sink append is logged
    /// and left to the dedup retry path.
    pub fn enroll(
        &mut self,
        details: EnrollmentDetails,
        store: &GalleryStore,
        sink: &mut dyn AttendanceSink,
        now: DateTime<Local>,
    ) -> Result<(), StoreError> {
        let Some(embedding) = self.pending_unknown.take() else {
            tracing::warn!("enrollment requested with no pending unknown face");
            return Ok(());
        };

        let identity = Identity {
            embedding,
            name: details.name.clone(),
            roll_number: details.roll_number.clone(),
            section: details.section.clone(),
        };

        if let Err(e) = store.save(&identity) {
            self.pending_unknown = Some(identity.embedding);
            return Err(e);
        }
        self.gallery.insert(identity);

        let row = AttendanceRow::new(&details.name, &details.roll_number, &details.section, now);
        match sink.append_row(&row) {
            Ok(()) => {
                tracing::info!(name = %details.name, "enrolled and attendance logged");
                self.logged.insert(details.name);
            }
            Err(e) => {
                tracing::warn!(
                    name = %details.name,
                    error = %e,
                    "attendance append failed during enrollment; will retry on next sighting"
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rollcall_sheets::SinkError;

    struct MockSink {
        rows: Vec<AttendanceRow>,
        headers_written: usize,
        fail_appends: bool,
    }

    impl MockSink {
        fn new() -> Self {
            Self {
                rows: Vec::new(),
                headers_written: 0,
                fail_appends: false,
            }
        }
    }

    impl AttendanceSink for MockSink {
        fn write_header(&mut self) -> Result<(), SinkError> {
            self.headers_written += 1;
            Ok(())
        }

        fn append_row(&mut self, row: &AttendanceRow) -> Result<(), SinkError> {
            if self.fail_appends {
                return Err(SinkError::Network("connection reset".to_string()));
            }
            self.rows.push(row.clone());
            Ok(())
        }
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 14, 9, 0, 0).unwrap()
    }

    fn detection(values: Vec<f32>) -> Detection {
        Detection {
            bbox: BoundingBox {
                x: 10.0,
                y: 10.0,
                width: 50.0,
                height: 50.0,
                confidence: 0.9,
            },
            embedding: Embedding::new(values),
        }
    }

    fn gallery_with(name: &str, values: Vec<f32>) -> Gallery {
        let mut gallery = Gallery::new();
        gallery.insert(Identity {
            embedding: Embedding::new(values),
            name: name.to_string(),
            roll_number: "07".to_string(),
            section: "CS-A".to_string(),
        });
        gallery
    }

    #[test]
    fn test_recognized_face_logged_once_per_run() {
        let mut session = Session::new(gallery_with("alice", vec![0.0, 0.0]), 0.6);
        let mut sink = MockSink::new();

        for _ in 0..5 {
            let labels = session.observe(&[detection(vec![0.0, 0.0])], &mut sink, now());
            assert_eq!(labels[0].name.as_deref(), Some("alice"));
        }

        assert_eq!(sink.rows.len(), 1);
        assert_eq!(sink.rows[0].name, "alice");
        assert_eq!(sink.rows[0].roll_number, "07");
        assert_eq!(sink.rows[0].section, "CS-A");
    }

    #[test]
    fn test_failed_append_retried_on_next_sighting() {
        let mut session = Session::new(gallery_with("alice", vec![0.0, 0.0]), 0.6);
        let mut sink = MockSink::new();

        sink.fail_appends = true;
        session.observe(&[detection(vec![0.0, 0.0])], &mut sink, now());
        assert!(sink.rows.is_empty());

        sink.fail_appends = false;
        session.observe(&[detection(vec![0.0, 0.0])], &mut sink, now());
        assert_eq!(sink.rows.len(), 1);

        // And still only once after recovery.
        session.observe(&[detection(vec![0.0, 0.0])], &mut sink, now());
        assert_eq!(sink.rows.len(), 1);
    }

    #[test]
    fn test_unknown_face_labeled_and_retained() {
        let mut session = Session::new(Gallery::new(), 0.6);
        let mut sink = MockSink::new();

        let labels = session.observe(&[detection(vec![1.0, 1.0])], &mut sink, now());

        assert_eq!(labels.len(), 1);
        assert!(labels[0].name.is_none());
        assert!(session.has_pending_unknown());
        assert!(sink.rows.is_empty());
    }

    #[test]
    fn test_last_unknown_in_frame_wins() {
        let mut session = Session::new(Gallery::new(), 0.6);
        let mut sink = MockSink::new();
        let dir = tempfile::tempdir().unwrap();
        let store = GalleryStore::new(dir.path());

        session.observe(
            &[detection(vec![1.0, 0.0]), detection(vec![0.0, 1.0])],
            &mut sink,
            now(),
        );

        let details = EnrollmentDetails {
            name: "bob".to_string(),
            roll_number: "12".to_string(),
            section: "CS-B".to_string(),
        };
        session.enroll(details, &store, &mut sink, now()).unwrap();

        // The enrolled embedding is the second (last) unknown.
        assert_eq!(
            session.gallery().get("bob").unwrap().embedding.values,
            vec![0.0, 1.0]
        );
    }

    #[test]
    fn test_enrollment_end_to_end() {
        let mut session = Session::new(Gallery::new(), 0.6);
        let mut sink = MockSink::new();
        let dir = tempfile::tempdir().unwrap();
        let store = GalleryStore::new(dir.path());

        session.observe(&[detection(vec![0.25, 0.25])], &mut sink, now());
        assert!(session.has_pending_unknown());

        let details = EnrollmentDetails {
            name: "Alice".to_string(),
            roll_number: "07".to_string(),
            section: "CS-A".to_string(),
        };
        session.enroll(details, &store, &mut sink, now()).unwrap();

        // One persisted record, one sink row, pending cleared.
        assert!(dir.path().join("Alice.json").is_file());
        assert_eq!(sink.rows.len(), 1);
        assert_eq!(sink.rows[0].name, "Alice");
        assert_eq!(sink.rows[0].roll_number, "07");
        assert_eq!(sink.rows[0].section, "CS-A");
        assert!(!session.has_pending_unknown());

        // Matchable on the very next frame, without a duplicate row.
        let labels = session.observe(&[detection(vec![0.25, 0.25])], &mut sink, now());
        assert_eq!(labels[0].name.as_deref(), Some("Alice"));
        assert_eq!(sink.rows.len(), 1);
    }

    #[test]
    fn test_reenrollment_overwrites_without_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let store = GalleryStore::new(dir.path());
        let mut sink = MockSink::new();
        let mut session = Session::new(gallery_with("alice", vec![0.0, 0.0]), 0.6);

        // A different face enrolled under the same name.
        session.observe(&[detection(vec![5.0, 5.0])], &mut sink, now());
        let details = EnrollmentDetails {
            name: "alice".to_string(),
            roll_number: "99".to_string(),
            section: "CS-Z".to_string(),
        };
        session.enroll(details, &store, &mut sink, now()).unwrap();

        assert_eq!(session.gallery().len(), 1);
        let updated = session.gallery().get("alice").unwrap();
        assert_eq!(updated.roll_number, "99");
        assert_eq!(updated.embedding.values, vec![5.0, 5.0]);

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get("alice").unwrap().roll_number, "99");
    }

    #[test]
    fn test_enrollment_sink_failure_leaves_retry_open() {
        let mut session = Session::new(Gallery::new(), 0.6);
        let mut sink = MockSink::new();
        let dir = tempfile::tempdir().unwrap();
        let store = GalleryStore::new(dir.path());

        session.observe(&[detection(vec![0.5, 0.5])], &mut sink, now());
        sink.fail_appends = true;
        let details = EnrollmentDetails {
            name: "carol".to_string(),
            roll_number: "31".to_string(),
            section: "CS-C".to_string(),
        };
        // Enrollment itself succeeds: the record is saved.
        session.enroll(details, &store, &mut sink, now()).unwrap();
        assert!(dir.path().join("carol.json").is_file());
        assert!(sink.rows.is_empty());

        // The next sighting logs the missed event — exactly once.
        sink.fail_appends = false;
        session.observe(&[detection(vec![0.5, 0.5])], &mut sink, now());
        session.observe(&[detection(vec![0.5, 0.5])], &mut sink, now());
        assert_eq!(sink.rows.len(), 1);
        assert_eq!(sink.rows[0].name, "carol");
    }

    #[test]
    fn test_enroll_without_pending_is_a_noop() {
        let mut session = Session::new(Gallery::new(), 0.6);
        let mut sink = MockSink::new();
        let dir = tempfile::tempdir().unwrap();
        let store = GalleryStore::new(dir.path());

        let details = EnrollmentDetails {
            name: "ghost".to_string(),
            roll_number: "00".to_string(),
            section: "X".to_string(),
        };
        session.enroll(details, &store, &mut sink, now()).unwrap();

        assert!(session.gallery().is_empty());
        assert!(sink.rows.is_empty());
    }
}
