//! Shipment creation and cancellation.

use async_trait::async_trait;
use terroir_core::{Destination, Order};
use tracing::instrument;

use super::types::{CreateShipmentRequest, Parcel, Party, Shipment};
use super::{BoxtalClient, BoxtalError, CarrierGateway};

/// Fixed sender profile: the roastery's warehouse.
const SENDER_NAME: &str = "Terroir Torréfaction";
const SENDER_EMAIL: &str = "expedition@terroir.coffee";
const SENDER_PHONE: &str = "+33478120456";
const SENDER_LINE1: &str = "18 quai Saint-Antoine";
const SENDER_POSTAL_CODE: &str = "69002";
const SENDER_CITY: &str = "Lyon";
const SENDER_COUNTRY: &str = "FR";

/// Recipient phone used when the customer never gave one; the carrier
/// requires the field.
const PLACEHOLDER_PHONE: &str = "+33100000000";

/// Externally-visible order reference embedded in carrier payloads.
///
/// Deterministic from the order id so tracking webhooks can resolve the
/// order even when the shipment id is absent from the event.
#[must_use]
pub fn order_reference(order_id: uuid::Uuid) -> String {
    let simple = order_id.simple().to_string();
    format!("TER-{}", simple.get(..8).unwrap_or(&simple).to_uppercase())
}

fn sender() -> Party {
    Party {
        name: SENDER_NAME.to_string(),
        email: Some(SENDER_EMAIL.to_string()),
        phone: SENDER_PHONE.to_string(),
        line1: SENDER_LINE1.to_string(),
        line2: None,
        postal_code: SENDER_POSTAL_CODE.to_string(),
        city: SENDER_CITY.to_string(),
        country: SENDER_COUNTRY.to_string(),
    }
}

/// Fall back to the email's local part when no name was captured.
fn name_from_email(email: &str) -> String {
    email
        .split('@')
        .next()
        .filter(|part| !part.is_empty())
        .unwrap_or("Client")
        .to_string()
}

/// Assemble the carrier payload for an order.
///
/// Fallbacks are deliberate: recipient name derives from the email local
/// part when absent, a placeholder phone satisfies the carrier's required
/// field, and the relay code may come from previously persisted metadata
/// when the destination payload lost it.
///
/// # Errors
///
/// Returns `BoxtalError::MissingRelayCode` for a relay destination with no
/// resolvable relay code.
pub fn build_shipment_request(order: &Order) -> Result<CreateShipmentRequest, BoxtalError> {
    let (recipient, relay_code) = match &order.destination {
        Destination::Home { address } => {
            let name = match (&address.first_name, &address.last_name) {
                (Some(first), Some(last)) => format!("{first} {last}"),
                (Some(first), None) => first.clone(),
                (None, Some(last)) => last.clone(),
                (None, None) => name_from_email(&order.email),
            };
            let recipient = Party {
                name,
                email: Some(order.email.clone()),
                phone: address
                    .phone
                    .clone()
                    .unwrap_or_else(|| PLACEHOLDER_PHONE.to_string()),
                line1: address.line1.clone(),
                line2: address.line2.clone(),
                postal_code: address.postal_code.clone(),
                city: address.city.clone(),
                country: address.country.clone(),
            };
            (recipient, None)
        }
        Destination::Relay { relay } => {
            let code = if relay.code.is_empty() {
                order
                    .metadata
                    .relay_code
                    .clone()
                    .ok_or(BoxtalError::MissingRelayCode)?
            } else {
                relay.code.clone()
            };
            let recipient = Party {
                name: name_from_email(&order.email),
                email: Some(order.email.clone()),
                phone: PLACEHOLDER_PHONE.to_string(),
                line1: relay.name.clone().unwrap_or_else(|| code.clone()),
                line2: None,
                postal_code: relay.postal_code.clone(),
                city: relay.city.clone(),
                country: relay.country.clone(),
            };
            (recipient, Some(code))
        }
    };

    Ok(CreateShipmentRequest {
        sender: sender(),
        recipient,
        parcel: Parcel {
            weight_grams: order.total_weight_grams(),
        },
        relay_code,
        external_reference: order_reference(order.id),
    })
}

#[async_trait]
impl CarrierGateway for BoxtalClient {
    #[instrument(skip(self, request), fields(reference = %request.external_reference))]
    async fn create_shipment(
        &self,
        request: CreateShipmentRequest,
    ) -> Result<Shipment, BoxtalError> {
        self.post_json("/shipments", &request).await
    }

    #[instrument(skip(self))]
    async fn cancel_shipment(&self, shipment_id: &str) -> Result<(), BoxtalError> {
        self.delete(&format!("/shipments/{shipment_id}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use terroir_core::{
        Address, FulfillmentStatus, LineItem, OrderMetadata, OrderStatus, PaymentStatus,
        RelayDescriptor,
    };
    use uuid::Uuid;

    fn base_order(destination: Destination) -> Order {
        Order {
            id: Uuid::new_v4(),
            email: "claire.dubois@example.fr".to_string(),
            customer_id: None,
            total: Decimal::new(2490, 2),
            currency: "eur".to_string(),
            destination,
            line_items: vec![LineItem {
                product_id: Uuid::new_v4(),
                title: "Monthly box".to_string(),
                quantity: 1,
                unit_price: Decimal::new(2490, 2),
                weight_grams: 850,
            }],
            status: OrderStatus::Pending,
            fulfillment_status: FulfillmentStatus::NotFulfilled,
            payment_status: PaymentStatus::Captured,
            metadata: OrderMetadata::default(),
        }
    }

    #[test]
    fn test_home_delivery_uses_address_name_and_phone() {
        let order = base_order(Destination::Home {
            address: Address {
                first_name: Some("Claire".to_string()),
                last_name: Some("Dubois".to_string()),
                line1: "12 rue des Lilas".to_string(),
                postal_code: "69001".to_string(),
                city: "Lyon".to_string(),
                country: "FR".to_string(),
                phone: Some("+33611223344".to_string()),
                ..Address::default()
            },
        });

        let request = build_shipment_request(&order).expect("valid request");
        assert_eq!(request.recipient.name, "Claire Dubois");
        assert_eq!(request.recipient.phone, "+33611223344");
        assert_eq!(request.relay_code, None);
        assert_eq!(request.parcel.weight_grams, 850);
    }

    #[test]
    fn test_missing_name_falls_back_to_email_local_part() {
        let order = base_order(Destination::Home {
            address: Address {
                line1: "12 rue des Lilas".to_string(),
                postal_code: "69001".to_string(),
                city: "Lyon".to_string(),
                country: "FR".to_string(),
                ..Address::default()
            },
        });

        let request = build_shipment_request(&order).expect("valid request");
        assert_eq!(request.recipient.name, "claire.dubois");
        assert_eq!(request.recipient.phone, PLACEHOLDER_PHONE);
    }

    #[test]
    fn test_relay_code_falls_back_to_metadata() {
        let mut order = base_order(Destination::Relay {
            relay: RelayDescriptor {
                code: String::new(),
                name: Some("Tabac de la Gare".to_string()),
                postal_code: "75011".to_string(),
                city: "Paris".to_string(),
                country: "FR".to_string(),
            },
        });
        order.metadata.relay_code = Some("FR-55821".to_string());

        let request = build_shipment_request(&order).expect("valid request");
        assert_eq!(request.relay_code.as_deref(), Some("FR-55821"));
    }

    #[test]
    fn test_relay_without_any_code_is_rejected() {
        let order = base_order(Destination::Relay {
            relay: RelayDescriptor {
                code: String::new(),
                name: None,
                postal_code: "75011".to_string(),
                city: "Paris".to_string(),
                country: "FR".to_string(),
            },
        });

        assert!(matches!(
            build_shipment_request(&order),
            Err(BoxtalError::MissingRelayCode)
        ));
    }

    #[test]
    fn test_order_reference_is_stable_and_short() {
        let id = Uuid::new_v4();
        let a = order_reference(id);
        let b = order_reference(id);
        assert_eq!(a, b);
        assert!(a.starts_with("TER-"));
        assert_eq!(a.len(), 12);
    }
}
