//! Service (channel) model behaviour used by the registry merge

use crate::models::{ChannelOrigin, DeliveryMethod, Service, ServiceField, ServiceType};

impl Service {
    pub fn is_radio(&self) -> bool {
        self.service_type == ServiceType::Radio
    }

    pub fn is_video(&self) -> bool {
        self.service_type == ServiceType::Tv
    }

    pub fn is_ip_delivered(&self) -> bool {
        self.delivery_method == DeliveryMethod::Ip
    }

    /// Primary channel with the named fields taken from `secondary`
    pub fn merged_with(&self, secondary: &Service, fields: &[ServiceField]) -> Service {
        let mut merged = self.clone();
        for field in fields {
            match field {
                ServiceField::LogicalChannelNum => {
                    merged.logical_channel_num = secondary.logical_channel_num
                }
                ServiceField::Name => merged.name = secondary.name.clone(),
                ServiceField::ServiceType => merged.service_type = secondary.service_type,
                ServiceField::DeliveryMethod => merged.delivery_method = secondary.delivery_method,
                ServiceField::IsSubscribed => merged.is_subscribed = secondary.is_subscribed,
                ServiceField::Uri => merged.uri = secondary.uri.clone(),
            }
        }
        merged.origin = ChannelOrigin::Merged;
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(id: &str, name: &str) -> Service {
        Service {
            service_id: id.to_string(),
            logical_channel_num: 1,
            name: name.to_string(),
            service_type: ServiceType::Tv,
            delivery_method: DeliveryMethod::Gateway,
            is_subscribed: false,
            uri: None,
            origin: ChannelOrigin::HeadEnd,
        }
    }

    #[test]
    fn test_merge_overrides_only_named_fields() {
        let primary = service("1", "A");
        let mut secondary = service("1", "B");
        secondary.is_subscribed = true;
        secondary.uri = Some("dvb://1.2.3".to_string());

        let merged = primary.merged_with(&secondary, &[ServiceField::Name]);
        assert_eq!(merged.name, "B");
        assert!(!merged.is_subscribed);
        assert_eq!(merged.uri, None);
        assert_eq!(merged.origin, ChannelOrigin::Merged);
    }
}
