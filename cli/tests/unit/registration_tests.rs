//! Domain listing and availability checks.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::cell::RefCell;

use anyhow::Result;
use ecsup::application::ports::DomainApi;
use ecsup::application::services::registration::{check, list};
use ecsup::domain::{Availability, DomainCheck, RegisteredDomain, RegistrationError};

/// Registry that knows one taken name and records every name it is asked about.
#[derive(Default)]
struct FakeRegistry {
    asked: RefCell<Vec<String>>,
}

impl DomainApi for FakeRegistry {
    async fn list_domains(&self) -> Result<Vec<RegisteredDomain>> {
        Ok(vec![RegisteredDomain {
            name: "example.com".to_string(),
            status: "3".to_string(),
            kind: "gTLD".to_string(),
            registered_at: "2017-11-02 04:00:45".to_string(),
            expires_at: "2030-11-02 04:00:45".to_string(),
        }])
    }

    async fn check_domain(&self, name: &str) -> Result<DomainCheck> {
        self.asked.borrow_mut().push(name.to_string());
        let taken = name == "example.com";
        Ok(DomainCheck {
            name: name.to_string(),
            availability: Availability::from_code(if taken { 0 } else { 1 }),
            reason: if taken { "In use".to_string() } else { String::new() },
            price: Some(69),
        })
    }
}

#[tokio::test]
async fn check_normalizes_the_name_first() {
    let registry = FakeRegistry::default();

    let result = check(&registry, " Example.COM ").await.expect("check");

    assert_eq!(registry.asked.borrow().as_slice(), ["example.com"]);
    assert_eq!(result.availability, Availability::Taken);
}

#[tokio::test]
async fn malformed_name_never_reaches_the_provider() {
    let registry = FakeRegistry::default();

    let err = check(&registry, "not a domain").await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<RegistrationError>(),
        Some(RegistrationError::InvalidName(_))
    ));
    assert!(registry.asked.borrow().is_empty());
}

#[tokio::test]
async fn list_returns_provider_domains() {
    let domains = list(&FakeRegistry::default()).await.expect("list");
    assert_eq!(domains.len(), 1);
    assert_eq!(domains[0].status_label(), "normal");
}
