//! Mocks for doc examples
use crate::buffer::RxProducer;
use core::convert::Infallible;
use embedded_io::{ErrorType, Write};
use fugit::{TimerDurationU32, TimerInstantU32};
use fugit_timer::Timer;
use heapless::Vec;

/// Serial mock scripting the replies of a live module.
///
/// Written bytes are collected until the flush that ends a transmission,
/// then the reply a real module would produce for the recognized commands is
/// fed into the receive channel. Unrecognized commands are answered with a
/// plain `OK`.
pub struct ExampleSerial<'q, const N: usize> {
    producer: RxProducer<'q, N>,

    /// Bytes of the transmission in progress
    command: Vec<u8, 256>,
}

impl<'q, const N: usize> ExampleSerial<'q, N> {
    pub fn new(producer: RxProducer<'q, N>) -> Self {
        Self {
            producer,
            command: Vec::new(),
        }
    }

    fn reply(&mut self, data: &[u8]) {
        for byte in data {
            self.producer.push(*byte);
        }
    }
}

impl<const N: usize> ErrorType for ExampleSerial<'_, N> {
    type Error = Infallible;
}

impl<const N: usize> Write for ExampleSerial<'_, N> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.command.extend_from_slice(buf).ok();
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        let command = core::mem::take(&mut self.command);

        match command.as_slice() {
            b"AT+CWJAP_CUR=\"test_wifi\",\"secret\"\r\n" => {
                self.reply(b"WIFI CONNECTED\r\nWIFI GOT IP\r\nOK\r\n");
            }
            b"AT+CIPSTART=0,\"TCP\",\"10.0.0.1\",21\r\n" => self.reply(b"0,CONNECT\r\nOK\r\n"),
            b"AT+CIPSENDEX=0,2048\r\n" => self.reply(b"> "),
            b"AT+CIPCLOSE=0\r\n" => self.reply(b"0,CLOSED\r\nOK\r\n"),
            b"AT+PING=\"10.0.0.1\"\r\n" => self.reply(b"+23\r\nOK\r\n"),
            // Raw payload of a send cycle, ends with the cycle terminator
            payload if payload.ends_with(b"\\0") => self.reply(b"Recv 6 bytes\r\nSEND OK\r\n"),
            _ => self.reply(b"OK\r\n"),
        }

        Ok(())
    }
}

/// Timer mock with a strictly monotonic clock
#[derive(Default)]
pub struct ExampleTimer {
    now: u32,
}

impl Timer<1_000_000> for ExampleTimer {
    type Error = u32;

    fn now(&mut self) -> TimerInstantU32<1_000_000> {
        self.now = self.now.wrapping_add(1);
        TimerInstantU32::from_ticks(self.now)
    }

    fn start(&mut self, _duration: TimerDurationU32<1_000_000>) -> Result<(), Self::Error> {
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), Self::Error> {
        unimplemented!()
    }

    fn wait(&mut self) -> nb::Result<(), Self::Error> {
        nb::Result::Err(nb::Error::WouldBlock)
    }
}
