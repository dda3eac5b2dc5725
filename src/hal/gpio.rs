//! Typed port pins for the ATmega328P board wiring.

use avr_device::atmega328p::{PORTB, PORTC, PORTD};
use core::convert::Infallible;
use core::marker::PhantomData;

pub trait PinMode {}
pub struct Input;
pub struct Output;
impl PinMode for Input {}
impl PinMode for Output {}

pub struct Pin<PORT, const PIN: u8, MODE> {
    _port: PhantomData<PORT>,
    _mode: PhantomData<MODE>,
}

macro_rules! impl_port {
    ($PORT:ident, $ddr:ident, $pin:ident, $port:ident) => {
        impl<const P: u8, MODE: PinMode> Pin<$PORT, P, MODE> {
            pub const fn new() -> Self {
                Pin {
                    _port: PhantomData,
                    _mode: PhantomData,
                }
            }

            pub fn into_output(self) -> Pin<$PORT, P, Output> {
                unsafe {
                    (*$PORT::ptr()).$ddr.modify(|r, w| w.bits(r.bits() | (1 << P)));
                }
                Pin::new()
            }

            pub fn into_input(self) -> Pin<$PORT, P, Input> {
                // input without pull-up
                unsafe {
                    (*$PORT::ptr()).$ddr.modify(|r, w| w.bits(r.bits() & !(1 << P)));
                    (*$PORT::ptr()).$port.modify(|r, w| w.bits(r.bits() & !(1 << P)));
                }
                Pin::new()
            }

            pub fn into_pull_up_input(self) -> Pin<$PORT, P, Input> {
                unsafe {
                    (*$PORT::ptr()).$ddr.modify(|r, w| w.bits(r.bits() & !(1 << P)));
                    (*$PORT::ptr()).$port.modify(|r, w| w.bits(r.bits() | (1 << P)));
                }
                Pin::new()
            }
        }

        impl<const P: u8> Pin<$PORT, P, Output> {
            #[inline]
            pub fn set_high(&mut self) {
                unsafe {
                    (*$PORT::ptr()).$port.modify(|r, w| w.bits(r.bits() | (1 << P)));
                }
            }

            #[inline]
            pub fn set_low(&mut self) {
                unsafe {
                    (*$PORT::ptr()).$port.modify(|r, w| w.bits(r.bits() & !(1 << P)));
                }
            }
        }

        impl<const P: u8> Pin<$PORT, P, Input> {
            #[inline]
            pub fn is_high(&self) -> bool {
                unsafe { ((*$PORT::ptr()).$pin.read().bits() & (1 << P)) != 0 }
            }

            #[inline]
            pub fn is_low(&self) -> bool {
                !self.is_high()
            }
        }

        impl<const P: u8> embedded_hal::digital::v2::OutputPin for Pin<$PORT, P, Output> {
            type Error = Infallible;

            fn set_high(&mut self) -> Result<(), Infallible> {
                Pin::<$PORT, P, Output>::set_high(self);
                Ok(())
            }

            fn set_low(&mut self) -> Result<(), Infallible> {
                Pin::<$PORT, P, Output>::set_low(self);
                Ok(())
            }
        }

        impl<const P: u8> embedded_hal::digital::v2::InputPin for Pin<$PORT, P, Input> {
            type Error = Infallible;

            fn is_high(&self) -> Result<bool, Infallible> {
                Ok(Pin::<$PORT, P, Input>::is_high(self))
            }

            fn is_low(&self) -> Result<bool, Infallible> {
                Ok(Pin::<$PORT, P, Input>::is_low(self))
            }
        }
    };
}

impl_port!(PORTB, ddrb, pinb, portb);
impl_port!(PORTC, ddrc, pinc, portc);
impl_port!(PORTD, ddrd, pind, portd);

// Board-specific pin assignments
pub mod board {
    use super::*;

    // control lines of the extended counter front end
    pub type CounterCtrlDiv = Pin<PORTD, 5, Output>;
    pub type CounterCtrlCh0 = Pin<PORTD, 6, Output>;
    pub type CounterCtrlCh1 = Pin<PORTD, 3, Output>;

    // test key (active low)
    pub type TestKey = Pin<PORTD, 7, Input>;
}
