use std::f64::consts::PI;

use measurements::{Frequency, Voltage};

use fgenrs::{RetryInterface, UsbTmcInterface};

use rigol_dg1022::{Dg1022, DriverOptions, StandardWaveform};

fn main() {
    // Open the usbtmc device of the instrument and retry failed transfers twice.
    let usb = UsbTmcInterface::simple("/dev/usbtmc0").expect("Instrument must be available.");
    let interface = RetryInterface::new(usb, 2);

    // Open the DG1022, make sure it is one, and start from a clean state.
    let opts = DriverOptions::default()
        .with_id_query(true)
        .with_reset(true);
    let mut inst = Dg1022::try_new_with_options(interface, opts).unwrap();

    println!("Instrument name: {}", inst.get_name().unwrap());

    // Output 2: 1 kHz square wave with 30 % duty cycle
    let mut ch2 = inst.get_channel(1).unwrap();
    ch2.set_waveform(StandardWaveform::Square).unwrap();
    ch2.set_frequency(Frequency::from_hertz(1000.0)).unwrap();
    ch2.set_duty_cycle(30.0).unwrap();
    ch2.set_amplitude(Voltage::from_volts(3.3)).unwrap();
    ch2.set_output_enabled(true).unwrap();

    // Output 1: a damped sine as arbitrary waveform, 1 us per sample
    let times: Vec<f64> = (0..1024).map(|i| f64::from(i) * 1e-6).collect();
    let samples: Vec<f64> = times
        .iter()
        .map(|t| (2.0 * PI * 1e4 * t).sin() * (-t / 3e-4).exp())
        .collect();
    let mut ch1 = inst.get_channel(0).unwrap();
    let handle = ch1.create_waveform(&samples, Some(&times)).unwrap();
    println!("Uploaded waveform as {handle}");
    ch1.set_output_enabled(true).unwrap();

    // Print the waveforms stored on the instrument and check for errors
    for entry in inst.get_catalog().unwrap().entries() {
        println!("{} ({:?} samples)", entry.name, entry.size);
    }
    println!("Error queue: {:?}", inst.get_error().unwrap());
}
