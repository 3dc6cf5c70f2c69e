use mrabox_layout::{grid_shape, normalize_locations, LocationLayout, RandomLayout, RegularGrid};
use ndarray::arr2;

fn main() {
    let xlimits = arr2(&[[0., 1.], [-10., 10.]]);

    println!("*** using regular grid layout");
    let locations = RegularGrid::new(&xlimits, &[4, 3]).locations();
    println!("{}\n", locations);
    println!("inferred grid shape: {:?}\n", grid_shape(&locations));

    println!("*** using random layout");
    let locations = RandomLayout::new(&xlimits, 10).locations();
    println!("{}\n", locations);

    println!("*** normalized into the unit square");
    let (xn, scaling) = normalize_locations(&locations);
    println!("{}", xn);
    println!("lower = {}, range = {}", scaling.lower(), scaling.range());
}
