// wristhub — MPU6050 Accelerometer Driver
//
// Register-level driver over the board's I2C bus. Only the accelerometer is
// used: ±4 g gives 8192 LSB/g, and the sample-rate divider matches the
// default poll rate so every tick finds one fresh sample.

use esp_idf_hal::i2c::I2cDriver;

use super::{AccelReading, PowerControl, SensorDriver, Vector3};
use crate::config::*;

const REG_SMPLRT_DIV: u8 = 0x19;
const REG_CONFIG: u8 = 0x1A;
const REG_ACCEL_CONFIG: u8 = 0x1C;
const REG_INT_ENABLE: u8 = 0x38;
const REG_INT_STATUS: u8 = 0x3A;
const REG_ACCEL_XOUT_H: u8 = 0x3B;
const REG_PWR_MGMT_1: u8 = 0x6B;
const REG_WHO_AM_I: u8 = 0x75;
const WHO_AM_I_EXPECTED: u8 = 0x68;

const PWR_SLEEP: u8 = 0x40;
const ACCEL_RANGE_4G: u8 = 0x08;
const DLPF_21HZ: u8 = 0x04;
const DATA_RDY: u8 = 0x01;
// 1 kHz internal rate / (1 + 79) = 12.5 Hz
const SAMPLE_DIV_12HZ5: u8 = 79;

pub struct Mpu6050 {
    i2c: I2cDriver<'static>,
}

impl Mpu6050 {
    pub fn new(i2c: I2cDriver<'static>) -> Self {
        Self { i2c }
    }

    /// Verify the device is reachable on the I2C bus.
    pub fn is_connected(&mut self) -> bool {
        let mut buf = [0u8; 1];
        match self
            .i2c
            .write_read(I2C_ADDR_MPU6050, &[REG_WHO_AM_I], &mut buf, I2C_TIMEOUT_TICKS)
        {
            Ok(()) => buf[0] == WHO_AM_I_EXPECTED,
            Err(_) => false,
        }
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> anyhow::Result<()> {
        self.i2c
            .write(I2C_ADDR_MPU6050, &[reg, value], I2C_TIMEOUT_TICKS)?;
        Ok(())
    }
}

impl PowerControl for Mpu6050 {
    fn init(&mut self, first_run: bool) -> anyhow::Result<()> {
        if first_run && !self.is_connected() {
            anyhow::bail!("MPU6050 not found at 0x{:02X}", I2C_ADDR_MPU6050);
        }
        self.write_reg(REG_PWR_MGMT_1, 0x00)?;
        self.write_reg(REG_CONFIG, DLPF_21HZ)?;
        self.write_reg(REG_SMPLRT_DIV, SAMPLE_DIV_12HZ5)?;
        self.write_reg(REG_ACCEL_CONFIG, ACCEL_RANGE_4G)?;
        self.write_reg(REG_INT_ENABLE, DATA_RDY)?;
        log::info!("MPU6050 initialised (±4g, 12.5Hz, DLPF 21Hz)");
        Ok(())
    }

    fn off(&mut self) -> anyhow::Result<()> {
        self.write_reg(REG_PWR_MGMT_1, PWR_SLEEP)
    }
}

impl SensorDriver for Mpu6050 {
    type Sample = AccelReading;

    fn poll_for_new_data(&mut self) -> anyhow::Result<bool> {
        let mut status = [0u8; 1];
        self.i2c
            .write_read(I2C_ADDR_MPU6050, &[REG_INT_STATUS], &mut status, I2C_TIMEOUT_TICKS)?;
        Ok(status[0] & DATA_RDY != 0)
    }

    fn read_sample(&mut self) -> anyhow::Result<AccelReading> {
        let mut raw = [0u8; 6];
        self.i2c
            .write_read(I2C_ADDR_MPU6050, &[REG_ACCEL_XOUT_H], &mut raw, I2C_TIMEOUT_TICKS)?;

        let axis = |hi: usize| i16::from_be_bytes([raw[hi], raw[hi + 1]]) as i32;
        // Board mounts the chip upside down: face-up reads -1 g on Z.
        Ok(AccelReading {
            xyz: Vector3::new(axis(0), -axis(2), -axis(4)),
            tap: None,
        })
    }
}
