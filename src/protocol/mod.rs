pub mod modbus;
pub mod regmap;
