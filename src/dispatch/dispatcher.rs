use log::{error, info, warn};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::dispatch::service::{FilePart, ProcessingRequest, ProcessingService};
use crate::queue::{TaskQueue, TaskResult, TaskStatus};
use crate::tools::{self, ResultKind, Tool};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("a batch run is already in flight")]
    BatchInFlight,
    #[error("object removal requires an authored mask and is dispatched per task")]
    BatchUnsupported,
    #[error("task not found: {0}")]
    TaskNotFound(Uuid),
    #[error("task {0} is not pending")]
    TaskNotPending(Uuid),
}

/// Structured body of a successful text-extraction response.
#[derive(Deserialize)]
struct TextPayload {
    text: String,
}

/// Sends pending tasks to the Processing Service, one awaited call at a
/// time, and writes status and result back per task. The re-entrancy guard
/// is instance state so independent queues can each run their own
/// dispatcher.
pub struct BatchDispatcher<S> {
    service: S,
    in_flight: AtomicBool,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S: ProcessingService> BatchDispatcher<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Runs one batch over a snapshot of the queue taken at entry. Records
    /// appended during the run wait for the next one. Per-task failures are
    /// recorded on the task and never abort the loop.
    pub async fn run_batch(&self, queue: &mut TaskQueue, tool: Tool) -> Result<(), DispatchError> {
        if tool == Tool::ObjectRemoval {
            return Err(DispatchError::BatchUnsupported);
        }
        if !queue.iter().any(|r| r.status == TaskStatus::Pending) {
            return Ok(());
        }
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return Err(DispatchError::BatchInFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let spec = tool.spec();
        let snapshot: Vec<Uuid> = queue.iter().map(|r| r.id).collect();
        info!(
            "batch run over {} records via {}",
            snapshot.len(),
            spec.endpoint
        );

        for id in snapshot {
            let Some(record) = queue.get(id) else {
                continue;
            };
            if record.status != TaskStatus::Pending {
                continue;
            }

            let file_name = record.file_name.clone();
            let request = ProcessingRequest {
                endpoint: spec.endpoint,
                file: FilePart {
                    field: "file",
                    file_name: file_name.clone(),
                    mime_type: record.mime_type.clone(),
                    bytes: record.file_bytes.clone(),
                },
                mask: None,
            };
            queue.update_status(id, TaskStatus::Processing, None);

            match self.service.dispatch(request).await {
                Ok(body) => match spec.result_kind {
                    ResultKind::PlainText => match serde_json::from_slice::<TextPayload>(&body) {
                        Ok(payload) => {
                            queue.update_status(
                                id,
                                TaskStatus::Success,
                                Some(TaskResult::text(payload.text)),
                            );
                        }
                        Err(e) => {
                            error!("task {}: unreadable text payload: {}", id, e);
                            queue.update_status(id, TaskStatus::Error, None);
                        }
                    },
                    ResultKind::BinaryImage | ResultKind::BinaryDocument => {
                        let result_name = format!(
                            "{}{}{}",
                            spec.result_prefix,
                            tools::file_stem(&file_name),
                            spec.result_extension
                        );
                        queue.update_status(
                            id,
                            TaskStatus::Success,
                            Some(TaskResult::file(body, result_name)),
                        );
                    }
                },
                Err(e) => {
                    warn!("task {}: {}", id, e);
                    queue.update_status(id, TaskStatus::Error, None);
                }
            }
        }

        Ok(())
    }

    /// Single-task object removal: posts the original file together with the
    /// authored mask. Bypasses the batch guard by design; the result keeps
    /// the full original filename after the prefix. Only pending records are
    /// eligible, same as the batch path.
    pub async fn dispatch_erase(
        &self,
        queue: &mut TaskQueue,
        id: Uuid,
        mask_png: Vec<u8>,
    ) -> Result<(), DispatchError> {
        let record = queue.get(id).ok_or(DispatchError::TaskNotFound(id))?;
        if record.status != TaskStatus::Pending {
            return Err(DispatchError::TaskNotPending(id));
        }
        let spec = Tool::ObjectRemoval.spec();

        let file_name = record.file_name.clone();
        let request = ProcessingRequest {
            endpoint: spec.endpoint,
            file: FilePart {
                field: "image",
                file_name: file_name.clone(),
                mime_type: record.mime_type.clone(),
                bytes: record.file_bytes.clone(),
            },
            mask: Some(FilePart {
                field: "mask",
                file_name: "mask.png".to_string(),
                mime_type: "image/png".to_string(),
                bytes: mask_png,
            }),
        };
        queue.update_status(id, TaskStatus::Processing, None);

        match self.service.dispatch(request).await {
            Ok(body) => {
                let result_name = format!("{}{}", spec.result_prefix, file_name);
                queue.update_status(
                    id,
                    TaskStatus::Success,
                    Some(TaskResult::file(body, result_name)),
                );
            }
            Err(e) => {
                warn!("erase task {}: {}", id, e);
                queue.update_status(id, TaskStatus::Error, None);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::service::TransportError;
    use crate::queue::InputFile;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tokio::sync::Notify;

    struct MockService {
        responses: Mutex<VecDeque<Result<Vec<u8>, TransportError>>>,
        calls: Mutex<Vec<ProcessingRequest>>,
    }

    impl MockService {
        fn new(responses: Vec<Result<Vec<u8>, TransportError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl ProcessingService for MockService {
        async fn dispatch(&self, request: ProcessingRequest) -> Result<Vec<u8>, TransportError> {
            self.calls.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("mock ran out of scripted responses")
        }
    }

    fn queue_with(names: &[&str]) -> (TaskQueue, Vec<Uuid>) {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut queue = TaskQueue::new();
        let files = names
            .iter()
            .map(|n| InputFile {
                name: n.to_string(),
                mime_type: "image/png".to_string(),
                bytes: vec![1, 2, 3],
            })
            .collect();
        let ids = queue.append(files);
        (queue, ids)
    }

    #[tokio::test]
    async fn background_removal_success_stores_result_and_filename() {
        let (mut queue, ids) = queue_with(&["photo.png"]);
        let dispatcher = BatchDispatcher::new(MockService::new(vec![Ok(vec![7, 7, 7])]));

        dispatcher
            .run_batch(&mut queue, Tool::BackgroundRemoval)
            .await
            .unwrap();

        let record = queue.get(ids[0]).unwrap();
        assert_eq!(record.status, TaskStatus::Success);
        assert_eq!(record.result_bytes.as_deref(), Some(&[7u8, 7, 7][..]));
        assert_eq!(record.result_file_name.as_deref(), Some("koukou_photo.png"));

        let calls = dispatcher.service.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].endpoint, "/api/remove-bg");
        assert_eq!(calls[0].file.field, "file");
        assert!(calls[0].mask.is_none());
    }

    #[tokio::test]
    async fn service_failure_sets_error_and_batch_continues() {
        let (mut queue, ids) = queue_with(&["a.png", "b.png"]);
        let dispatcher = BatchDispatcher::new(MockService::new(vec![
            Err(TransportError::Status(500)),
            Ok(vec![1]),
        ]));

        dispatcher
            .run_batch(&mut queue, Tool::BackgroundRemoval)
            .await
            .unwrap();

        let failed = queue.get(ids[0]).unwrap();
        assert_eq!(failed.status, TaskStatus::Error);
        assert!(failed.result_bytes.is_none());
        assert!(failed.result_file_name.is_none());
        assert!(failed.result_text.is_none());

        assert_eq!(queue.get(ids[1]).unwrap().status, TaskStatus::Success);
    }

    #[tokio::test]
    async fn non_pending_records_are_never_dispatched() {
        let (mut queue, ids) = queue_with(&["done.png", "todo.png"]);
        queue.update_status(ids[0], TaskStatus::Success, None);
        let dispatcher = BatchDispatcher::new(MockService::new(vec![Ok(vec![1])]));

        dispatcher
            .run_batch(&mut queue, Tool::BackgroundRemoval)
            .await
            .unwrap();

        assert_eq!(dispatcher.service.calls.lock().unwrap().len(), 1);
        assert_eq!(queue.get(ids[0]).unwrap().status, TaskStatus::Success);
        assert_eq!(queue.get(ids[1]).unwrap().status, TaskStatus::Success);
    }

    #[tokio::test]
    async fn run_without_eligible_records_makes_no_calls() {
        let (mut queue, ids) = queue_with(&["a.png"]);
        queue.update_status(ids[0], TaskStatus::Error, None);
        let dispatcher = BatchDispatcher::new(MockService::new(vec![]));

        dispatcher
            .run_batch(&mut queue, Tool::BackgroundRemoval)
            .await
            .unwrap();

        assert!(dispatcher.service.calls.lock().unwrap().is_empty());
        assert_eq!(queue.get(ids[0]).unwrap().status, TaskStatus::Error);
    }

    #[tokio::test]
    async fn object_removal_is_rejected_from_the_batch_path() {
        let (mut queue, _) = queue_with(&["a.png"]);
        let dispatcher = BatchDispatcher::new(MockService::new(vec![]));

        let result = dispatcher.run_batch(&mut queue, Tool::ObjectRemoval).await;
        assert!(matches!(result, Err(DispatchError::BatchUnsupported)));
    }

    #[tokio::test]
    async fn text_extraction_parses_the_structured_payload() {
        let (mut queue, ids) = queue_with(&["shot.png", "bad.png"]);
        let dispatcher = BatchDispatcher::new(MockService::new(vec![
            Ok(br#"{"text":"hello world"}"#.to_vec()),
            Ok(b"not json".to_vec()),
        ]));

        dispatcher
            .run_batch(&mut queue, Tool::TextExtraction)
            .await
            .unwrap();

        let parsed = queue.get(ids[0]).unwrap();
        assert_eq!(parsed.status, TaskStatus::Success);
        assert_eq!(parsed.result_text.as_deref(), Some("hello world"));
        assert!(parsed.result_bytes.is_none());
        assert!(parsed.result_file_name.is_none());

        assert_eq!(queue.get(ids[1]).unwrap().status, TaskStatus::Error);
    }

    #[tokio::test]
    async fn document_conversion_uses_its_own_naming() {
        let mut queue = TaskQueue::new();
        let ids = queue.append(vec![InputFile {
            name: "report.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            bytes: vec![0x25],
        }]);
        let dispatcher = BatchDispatcher::new(MockService::new(vec![Ok(vec![1])]));

        dispatcher
            .run_batch(&mut queue, Tool::DocumentConversion)
            .await
            .unwrap();

        assert_eq!(
            queue.get(ids[0]).unwrap().result_file_name.as_deref(),
            Some("processed_report.docx")
        );
    }

    #[tokio::test]
    async fn every_initially_pending_record_ends_terminal() {
        let (mut queue, _) = queue_with(&["a.png", "b.png", "c.png"]);
        let dispatcher = BatchDispatcher::new(MockService::new(vec![
            Ok(vec![1]),
            Err(TransportError::Request("connection refused".into())),
            Ok(vec![2]),
        ]));

        dispatcher
            .run_batch(&mut queue, Tool::BackgroundRemoval)
            .await
            .unwrap();

        assert!(queue.iter().all(|r| r.status.is_terminal()));
    }

    #[tokio::test]
    async fn erase_dispatch_sends_mask_and_keeps_full_name() {
        let (mut queue, ids) = queue_with(&["street.png"]);
        let dispatcher = BatchDispatcher::new(MockService::new(vec![Ok(vec![5])]));

        dispatcher
            .dispatch_erase(&mut queue, ids[0], vec![0, 0, 0])
            .await
            .unwrap();

        let record = queue.get(ids[0]).unwrap();
        assert_eq!(record.status, TaskStatus::Success);
        assert_eq!(record.result_file_name.as_deref(), Some("erased_street.png"));

        let calls = dispatcher.service.calls.lock().unwrap();
        assert_eq!(calls[0].endpoint, "/api/magic-eraser");
        assert_eq!(calls[0].file.field, "image");
        assert_eq!(calls[0].mask.as_ref().unwrap().field, "mask");
    }

    #[tokio::test]
    async fn erase_dispatch_failure_marks_the_task() {
        let (mut queue, ids) = queue_with(&["street.png"]);
        let dispatcher =
            BatchDispatcher::new(MockService::new(vec![Err(TransportError::Status(502))]));

        dispatcher
            .dispatch_erase(&mut queue, ids[0], vec![0])
            .await
            .unwrap();

        let record = queue.get(ids[0]).unwrap();
        assert_eq!(record.status, TaskStatus::Error);
        assert!(record.result_bytes.is_none());
    }

    #[tokio::test]
    async fn erase_dispatch_rejects_terminal_records() {
        let (mut queue, ids) = queue_with(&["street.png"]);
        queue.update_status(ids[0], TaskStatus::Success, None);
        let dispatcher = BatchDispatcher::new(MockService::new(vec![]));

        let result = dispatcher.dispatch_erase(&mut queue, ids[0], vec![0]).await;
        assert!(matches!(result, Err(DispatchError::TaskNotPending(_))));
        // No service call, no transition out of the terminal state.
        assert!(dispatcher.service.calls.lock().unwrap().is_empty());
        assert_eq!(queue.get(ids[0]).unwrap().status, TaskStatus::Success);
    }

    #[tokio::test]
    async fn erase_dispatch_unknown_task_is_an_error() {
        let mut queue = TaskQueue::new();
        let dispatcher = BatchDispatcher::new(MockService::new(vec![]));
        let result = dispatcher
            .dispatch_erase(&mut queue, Uuid::new_v4(), vec![0])
            .await;
        assert!(matches!(result, Err(DispatchError::TaskNotFound(_))));
    }

    /// Completes its first call only after `release` is notified, so a test
    /// can hold a batch open while probing the guard.
    struct GatedService {
        started: Arc<Notify>,
        release: Arc<Notify>,
    }

    impl ProcessingService for GatedService {
        async fn dispatch(&self, _request: ProcessingRequest) -> Result<Vec<u8>, TransportError> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(vec![1])
        }
    }

    #[tokio::test]
    async fn concurrent_batch_runs_are_rejected_and_guard_resets() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let dispatcher = Arc::new(BatchDispatcher::new(GatedService {
            started: started.clone(),
            release: release.clone(),
        }));

        let (mut first_queue, first_ids) = queue_with(&["a.png"]);
        let background = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .run_batch(&mut first_queue, Tool::BackgroundRemoval)
                    .await
                    .unwrap();
                first_queue
            })
        };
        started.notified().await;

        let (mut second_queue, second_ids) = queue_with(&["b.png"]);
        let rejected = dispatcher
            .run_batch(&mut second_queue, Tool::BackgroundRemoval)
            .await;
        assert!(matches!(rejected, Err(DispatchError::BatchInFlight)));
        assert_eq!(
            second_queue.get(second_ids[0]).unwrap().status,
            TaskStatus::Pending
        );

        release.notify_one();
        let first_queue = background.await.unwrap();
        assert_eq!(
            first_queue.get(first_ids[0]).unwrap().status,
            TaskStatus::Success
        );

        // Guard must be reset once the first run completed.
        release.notify_one();
        dispatcher
            .run_batch(&mut second_queue, Tool::BackgroundRemoval)
            .await
            .unwrap();
        assert_eq!(
            second_queue.get(second_ids[0]).unwrap().status,
            TaskStatus::Success
        );
    }
}
