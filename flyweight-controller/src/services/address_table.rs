use std::collections::HashMap;
use std::sync::Arc;

use flyweight_api::{NetAddress, NetGuid};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::errors::ControllerError;
use crate::models::NetworkDevice;

#[derive(Debug, Default)]
struct Indices {
    by_guid: HashMap<NetGuid, Arc<NetworkDevice>>,
    by_address: HashMap<NetAddress, Arc<NetworkDevice>>,
}

/// GUID and address indices over the registered devices.
///
/// Both maps live behind one lock so no reader can see one updated without
/// the other. A device's own address field is written under the same lock.
#[derive(Debug)]
pub struct AddressTable {
    /// Highest assignable address; the value above it is broadcast
    max_assignable: u8,
    indices: RwLock<Indices>,
}

impl Default for AddressTable {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressTable {
    pub fn new() -> Self {
        Self {
            max_assignable: NetAddress::BROADCAST.value() - 1,
            indices: RwLock::new(Indices::default()),
        }
    }

    /// Registers a device known to the site. It holds no address until it associates.
    pub async fn register(&self, device: NetworkDevice) -> Result<Arc<NetworkDevice>, ControllerError> {
        let mut indices = self.indices.write().await;
        let guid = device.guid();
        if indices.by_guid.contains_key(&guid) {
            return Err(ControllerError::DuplicateDevice(guid));
        }

        let device = Arc::new(device);
        indices.by_guid.insert(guid, device.clone());
        debug!("Registered device {}", guid);
        Ok(device)
    }

    pub async fn device_by_guid(&self, guid: &NetGuid) -> Option<Arc<NetworkDevice>> {
        self.indices.read().await.by_guid.get(guid).cloned()
    }

    pub async fn device_by_address(&self, address: NetAddress) -> Option<Arc<NetworkDevice>> {
        self.indices.read().await.by_address.get(&address).cloned()
    }

    pub async fn devices(&self) -> Vec<Arc<NetworkDevice>> {
        self.indices.read().await.by_guid.values().cloned().collect()
    }

    pub async fn assigned_count(&self) -> usize {
        self.indices.read().await.by_address.len()
    }

    /// Gives the device a network address, keeping the one it already holds.
    ///
    /// The seed is the low byte of the GUID (0 becomes 1). An occupied seed
    /// is followed by a forward search that wraps from the top back to 1.
    pub async fn assign_address(&self, guid: &NetGuid) -> Result<NetAddress, ControllerError> {
        let mut indices = self.indices.write().await;
        let device = indices
            .by_guid
            .get(guid)
            .cloned()
            .ok_or(ControllerError::UnknownDevice(*guid))?;

        if let Some(address) = device.address().await {
            debug!("Device {} keeps address {}", guid, address);
            return Ok(address);
        }

        let Some(address) = self.find_free_address(&indices, guid.low_byte()) else {
            warn!("Address table full, cannot assign {}", guid);
            return Err(ControllerError::AddressTableFull(*guid));
        };

        indices.by_address.insert(address, device.clone());
        device.set_address(Some(address)).await;
        debug_assert!(Self::is_consistent(&indices).await);

        info!("Assigned address {} to device {}", address, guid);
        Ok(address)
    }

    fn find_free_address(&self, indices: &Indices, seed: u8) -> Option<NetAddress> {
        let span = self.max_assignable as u16;
        let start = match seed {
            0 => 1,
            s if s > self.max_assignable => 1,
            s => s,
        } as u16;

        (0..span)
            .map(|offset| NetAddress::new(((start - 1 + offset) % span + 1) as u8))
            .find(|candidate| candidate.is_assignable() && !indices.by_address.contains_key(candidate))
    }

    /// Resets the device's association state, freeing the address it held if any.
    pub async fn release(&self, guid: &NetGuid) -> Option<NetAddress> {
        let mut indices = self.indices.write().await;
        let device = indices.by_guid.get(guid)?.clone();
        let address = device.address().await;

        if let Some(address) = address {
            indices.by_address.remove(&address);
            info!("Released address {} from device {}", address, guid);
        }
        device.reset().await;
        debug_assert!(Self::is_consistent(&indices).await);

        address
    }

    /// Drops the device record entirely.
    pub async fn remove(&self, guid: &NetGuid) -> Option<Arc<NetworkDevice>> {
        let mut indices = self.indices.write().await;
        let device = indices.by_guid.remove(guid)?;
        if let Some(address) = device.address().await {
            indices.by_address.remove(&address);
        }
        device.reset().await;
        Some(device)
    }

    /// Panics if the two indices disagree.
    pub async fn verify(&self) {
        let indices = self.indices.read().await;
        assert!(
            Self::is_consistent(&indices).await,
            "address and GUID indices disagree"
        );
    }

    async fn is_consistent(indices: &Indices) -> bool {
        for (address, device) in &indices.by_address {
            let Some(by_guid) = indices.by_guid.get(&device.guid()) else {
                return false;
            };
            if !Arc::ptr_eq(by_guid, device) || device.address().await != Some(*address) {
                return false;
            }
        }
        for device in indices.by_guid.values() {
            if let Some(address) = device.address().await {
                match indices.by_address.get(&address) {
                    Some(by_address) if Arc::ptr_eq(by_address, device) => {}
                    _ => return false,
                }
            }
        }
        true
    }
}
