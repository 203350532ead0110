use std::sync::Arc;

use crate::persons::domain::person::Person;
use crate::persons::domain::person_registry::PersonRegistry;
use crate::service::domain::face_service::FaceService;
use crate::shared::cancel_token::CancelToken;
use crate::shared::in_flight::InFlightSet;
use crate::shared::workflow_error::WorkflowError;

/// Issues train commands, at most one outstanding per person name.
///
/// The trained flag is never set locally; success invalidates the registry,
/// which observes the new flag on its next fetch.
pub struct TrainingController {
    service: Arc<dyn FaceService>,
    registry: Arc<PersonRegistry>,
    in_flight: InFlightSet,
}

impl TrainingController {
    pub fn new(service: Arc<dyn FaceService>, registry: Arc<PersonRegistry>) -> Self {
        Self {
            service,
            registry,
            in_flight: InFlightSet::new(),
        }
    }

    pub fn is_training(&self, name: &str) -> bool {
        self.in_flight.contains(name)
    }

    /// Trains `person`. The trained flag is read from the registry; the
    /// caller's copy only counts when the registry has no entry for the name.
    pub fn train(&self, person: &Person, cancel: &CancelToken) -> Result<(), WorkflowError> {
        if self.is_trained(person) {
            return Err(WorkflowError::AlreadyTrained(person.name.clone()));
        }
        let _claim = self
            .in_flight
            .try_claim(&person.name)
            .ok_or_else(|| WorkflowError::AlreadyInFlight(person.name.clone()))?;
        if cancel.is_cancelled() {
            return Err(WorkflowError::Cancelled);
        }

        self.service.train_person(&person.name)?;
        log::info!("Trained '{}'", person.name);
        self.registry.invalidate();

        if cancel.is_cancelled() {
            return Err(WorkflowError::Cancelled);
        }
        Ok(())
    }

    fn is_trained(&self, person: &Person) -> bool {
        if self.registry.is_stale() {
            if let Err(e) = self.registry.list() {
                log::warn!("Person list refresh failed before training: {e}");
            }
        }
        self.registry
            .get(&person.name)
            .map_or(person.trained, |known| known.trained)
    }

    /// Looks `name` up in the registry, then trains it.
    pub fn train_named(&self, name: &str, cancel: &CancelToken) -> Result<(), WorkflowError> {
        let person = self
            .registry
            .persons()?
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| WorkflowError::Validation(format!("unknown person '{name}'")))?;
        self.train(&person, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::domain::face_service::ServiceError;
    use crate::shared::settings::RefreshPolicy;
    use crate::staging::domain::staged_image::StagedImage;
    use crossbeam_channel::{unbounded, Receiver, Sender};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    // --- Stubs ---

    #[derive(Default)]
    struct StubTrainer {
        persons: Mutex<Vec<Person>>,
        train_calls: AtomicUsize,
        fail_next: Mutex<Option<ServiceError>>,
        gate: Option<(Sender<()>, Receiver<()>)>,
    }

    impl FaceService for StubTrainer {
        fn list_persons(&self) -> Result<Vec<Person>, ServiceError> {
            Ok(self.persons.lock().unwrap().clone())
        }

        fn create_person(&self, _name: &str) -> Result<(), ServiceError> {
            Ok(())
        }

        fn delete_person(&self, _name: &str) -> Result<(), ServiceError> {
            Ok(())
        }

        fn attach_images(&self, _name: &str, _images: &[StagedImage]) -> Result<(), ServiceError> {
            Ok(())
        }

        fn train_person(&self, name: &str) -> Result<(), ServiceError> {
            self.train_calls.fetch_add(1, Ordering::SeqCst);
            if let Some((started, release)) = &self.gate {
                started.send(()).unwrap();
                release.recv().unwrap();
            }
            if let Some(err) = self.fail_next.lock().unwrap().take() {
                return Err(err);
            }
            for p in self.persons.lock().unwrap().iter_mut() {
                if p.name == name {
                    p.trained = true;
                }
            }
            Ok(())
        }

        fn recognize(&self, _images: &[StagedImage]) -> Result<Vec<String>, ServiceError> {
            Ok(Vec::new())
        }
    }

    fn controller(service: StubTrainer) -> (Arc<TrainingController>, Arc<PersonRegistry>, Arc<StubTrainer>) {
        let service = Arc::new(service);
        let registry = Arc::new(PersonRegistry::new(service.clone(), RefreshPolicy::Immediate));
        let controller = Arc::new(TrainingController::new(service.clone(), registry.clone()));
        (controller, registry, service)
    }

    fn with_people(people: Vec<Person>) -> StubTrainer {
        StubTrainer {
            persons: Mutex::new(people),
            ..StubTrainer::default()
        }
    }

    // --- Tests ---

    #[test]
    fn test_train_refreshes_registry_to_trained() {
        let (controller, registry, _service) = controller(with_people(vec![Person::new("Alice", false)]));
        let alice = registry.persons().unwrap().remove(0);

        controller.train(&alice, &CancelToken::new()).unwrap();
        assert_eq!(registry.get("Alice"), Some(Person::new("Alice", true)));
        assert!(!controller.is_training("Alice"));
    }

    #[test]
    fn test_outdated_person_copy_cannot_retrain() {
        let (controller, registry, service) = controller(with_people(vec![Person::new("Alice", false)]));
        let alice = registry.persons().unwrap().remove(0);

        controller.train(&alice, &CancelToken::new()).unwrap();
        assert_eq!(
            controller.train(&alice, &CancelToken::new()),
            Err(WorkflowError::AlreadyTrained("Alice".into()))
        );
        assert_eq!(service.train_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_registry_flag_wins_over_caller_copy() {
        let (controller, _registry, service) = controller(with_people(vec![Person::new("Alice", true)]));

        assert_eq!(
            controller.train(&Person::new("Alice", false), &CancelToken::new()),
            Err(WorkflowError::AlreadyTrained("Alice".into()))
        );
        assert_eq!(service.train_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_already_trained_rejected_without_training_call() {
        let (controller, _registry, service) = controller(StubTrainer::default());
        assert_eq!(
            controller.train(&Person::new("Bob", true), &CancelToken::new()),
            Err(WorkflowError::AlreadyTrained("Bob".into()))
        );
        assert_eq!(service.train_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failure_leaves_state_and_allows_retry() {
        let service = with_people(vec![Person::new("Alice", false)]);
        *service.fail_next.lock().unwrap() = Some(ServiceError::Server {
            status: 404,
            body: "Person folder not found.".into(),
        });
        let (controller, registry, _service) = controller(service);
        let alice = registry.persons().unwrap().remove(0);

        assert!(matches!(
            controller.train(&alice, &CancelToken::new()),
            Err(WorkflowError::Server { status: 404, .. })
        ));
        assert_eq!(registry.get("Alice"), Some(Person::new("Alice", false)));
        assert!(!controller.is_training("Alice"));

        controller.train(&alice, &CancelToken::new()).unwrap();
        assert_eq!(registry.get("Alice").map(|p| p.trained), Some(true));
    }

    #[test]
    fn test_concurrent_train_for_same_name_rejected() {
        let (started_tx, started_rx) = unbounded();
        let (release_tx, release_rx) = unbounded();
        let service = StubTrainer {
            persons: Mutex::new(vec![Person::new("Alice", false), Person::new("Bob", false)]),
            gate: Some((started_tx, release_rx)),
            ..StubTrainer::default()
        };
        let (controller, _registry, service) = controller(service);

        let background = Arc::clone(&controller);
        let first = thread::spawn(move || {
            background.train(&Person::new("Alice", false), &CancelToken::new())
        });
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert!(controller.is_training("Alice"));
        assert_eq!(
            controller.train(&Person::new("Alice", false), &CancelToken::new()),
            Err(WorkflowError::AlreadyInFlight("Alice".into()))
        );

        release_tx.send(()).unwrap();
        assert_eq!(first.join().unwrap(), Ok(()));
        assert_eq!(service.train_calls.load(Ordering::SeqCst), 1);
        assert!(!controller.is_training("Alice"));
    }

    #[test]
    fn test_other_names_may_train_concurrently() {
        let (started_tx, started_rx) = unbounded();
        let (release_tx, release_rx) = unbounded();
        let service = StubTrainer {
            persons: Mutex::new(vec![Person::new("Alice", false), Person::new("Bob", false)]),
            gate: Some((started_tx, release_rx)),
            ..StubTrainer::default()
        };
        let (controller, _registry, _service) = controller(service);

        let background = Arc::clone(&controller);
        let first = thread::spawn(move || {
            background.train(&Person::new("Alice", false), &CancelToken::new())
        });
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let second_controller = Arc::clone(&controller);
        let second = thread::spawn(move || {
            second_controller.train(&Person::new("Bob", false), &CancelToken::new())
        });
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(controller.is_training("Bob"));

        release_tx.send(()).unwrap();
        release_tx.send(()).unwrap();
        assert_eq!(first.join().unwrap(), Ok(()));
        assert_eq!(second.join().unwrap(), Ok(()));
    }

    #[test]
    fn test_train_named_uses_registry_flag() {
        let (controller, _registry, service) = controller(with_people(vec![Person::new("Alice", true)]));
        assert_eq!(
            controller.train_named("Alice", &CancelToken::new()),
            Err(WorkflowError::AlreadyTrained("Alice".into()))
        );
        assert!(matches!(
            controller.train_named("Nobody", &CancelToken::new()),
            Err(WorkflowError::Validation(_))
        ));
        assert_eq!(service.train_calls.load(Ordering::SeqCst), 0);
    }
}
