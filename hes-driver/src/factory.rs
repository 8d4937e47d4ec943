use crate::driver::MeterDriver;
use crate::hexcell::HexcellMeterDriver;
use crate::hexing::HexingMeterDriver;
use hes_client::CosemConnection;
use hes_core::MeterBrand;
use std::sync::Arc;

/// Pick the driver for a brand once, when the session is set up
pub fn create_driver(brand: MeterBrand, connection: Arc<dyn CosemConnection>) -> Box<dyn MeterDriver> {
    match brand {
        MeterBrand::Hexing => Box::new(HexingMeterDriver::new(connection)),
        MeterBrand::Hexcell => Box::new(HexcellMeterDriver::new(connection)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::tests::MockConnection;
    use crate::field::LogicalField;

    #[test]
    fn test_factory_selects_table() {
        let hexing = create_driver(MeterBrand::Hexing, Arc::new(MockConnection::new()));
        assert_eq!(hexing.brand(), MeterBrand::Hexing);
        assert!(hexing.supports(LogicalField::VoltageSwells));

        let hexcell = create_driver(
            MeterBrand::parse_or_default("HEXCELL"),
            Arc::new(MockConnection::new()),
        );
        assert_eq!(hexcell.brand(), MeterBrand::Hexcell);
        assert!(!hexcell.supports(LogicalField::VoltageSwells));
    }
}
