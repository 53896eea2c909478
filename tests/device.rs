//! Drive a device through the public API against zeroed register memory

use std::sync::Mutex;

use aducm_sport::{
    DeviceMemory, Direction, DmaController, Error, Event, Interrupts, PortResources, Sport,
    SPORT0A, SPORT0B,
};

/// SPORT register block offsets, in words
const STAT: usize = 3;
const NUMTRAN: usize = 4;
const RX: usize = 10;

const TFI: u32 = 1 << 0;
const FSERR: u32 = 1 << 2;
const DXS_FULL: u32 = 3 << 8;

struct NoInterrupts;

impl Interrupts for NoInterrupts {
    fn enable(&self, _: u16) {}
    fn disable(&self, _: u16) {}
    fn clear_pending(&self, _: u16) {}
}

static NO_INTERRUPTS: NoInterrupts = NoInterrupts;

fn words(count: usize) -> &'static mut [u32] {
    Box::leak(vec![0u32; count].into_boxed_slice())
}

struct Board {
    sport: &'static Sport,
    half_a: *mut u32,
}

impl Board {
    fn new() -> Self {
        let half_a = words(16).as_mut_ptr();
        let half_b = words(16).as_mut_ptr();
        let dma = words(32).as_mut_ptr();
        let descriptors = words(64).as_mut_ptr();
        // Safety: every block is zeroed, leaked memory large enough for
        // the registers it stands in for.
        let sport = unsafe {
            Sport::new(
                PortResources {
                    registers: half_a as *const (),
                    ..SPORT0A
                },
                PortResources {
                    registers: half_b as *const (),
                    ..SPORT0B
                },
                DmaController::new(dma as *const (), descriptors as *const ()),
                &NO_INTERRUPTS,
            )
        };
        Board {
            sport: Box::leak(Box::new(sport)),
            half_a,
        }
    }

    fn write(&self, offset: usize, value: u32) {
        // Safety: offset is within the leaked block.
        unsafe { self.half_a.add(offset).write_volatile(value) }
    }

    fn read(&self, offset: usize) -> u32 {
        // Safety: offset is within the leaked block.
        unsafe { self.half_a.add(offset).read_volatile() }
    }

    fn interrupt(&self, stat: u32) {
        self.write(STAT, stat);
        self.sport.on_interrupt(0);
    }
}

fn memory() -> &'static DeviceMemory {
    Box::leak(Box::new(DeviceMemory::new()))
}

fn buffer(len: usize) -> &'static mut [u8] {
    let words = words(len / 4 + 1);
    // Safety: the words cover `len` bytes, and aren't used again.
    unsafe { std::slice::from_raw_parts_mut(words.as_mut_ptr().cast(), len) }
}

#[test]
fn receive_by_interrupt() {
    let board = Board::new();
    let device = board.sport.open(0, Direction::Rx, memory()).unwrap();
    device.submit_buffer(buffer(4), false).unwrap();
    assert_eq!(board.read(NUMTRAN), 4);

    board.write(RX, 0xA5);
    board.interrupt(DXS_FULL | TFI);

    let processed = device.get_buffer().unwrap();
    assert!(processed.status().is_ok());
    assert_eq!(processed.into_buffer(), &[0xA5; 4]);
    device.close().unwrap();
}

#[test]
fn frame_sync_error_reaches_blocked_reader() {
    let board = Board::new();
    let device = board.sport.open(0, Direction::Rx, memory()).unwrap();
    device.submit_buffer(buffer(8), false).unwrap();

    board.interrupt(FSERR);
    let processed = device.get_buffer().unwrap();
    match processed.status() {
        Err(Error::HwError(events)) => assert!(events.contains(Event::FrameSyncError)),
        other => panic!("unexpected status {other:?}"),
    }
    assert_eq!(processed.buffer().len(), 8);
}

#[test]
fn async_wait_resolves_after_retirement() {
    let board = Board::new();
    let device = board.sport.open(0, Direction::Tx, memory()).unwrap();
    device.submit_buffer(buffer(4), true).unwrap();

    let mut wait = Box::pin(device.wait_buffer());
    assert!(aducm_sport::poll_no_wake(wait.as_mut()).is_pending());
    board.interrupt(TFI);
    assert!(aducm_sport::poll_no_wake(wait.as_mut()).is_ready());
}

static DELIVERED: Mutex<usize> = Mutex::new(0);

fn count(_: aducm_sport::Notification) {
    *DELIVERED.lock().unwrap() += 1;
}

#[test]
fn callback_mode() {
    let board = Board::new();
    let device = board.sport.open(0, Direction::Tx, memory()).unwrap();
    device.register_callback(Some(&count)).unwrap();
    device.submit_buffer(buffer(4), true).unwrap();
    board.interrupt(TFI);
    assert_eq!(*DELIVERED.lock().unwrap(), 1);
    assert_eq!(device.get_buffer().err(), Some(Error::Failed));
}
